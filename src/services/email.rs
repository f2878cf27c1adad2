use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// Envoi d'emails transactionnels (réinitialisation du mot de passe)
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Transport par défaut : écrit l'email dans les logs
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, body = %email.body, "outgoing email");
        Ok(())
    }
}

pub fn password_reset(to: &str, reset_url: &str, ttl: std::time::Duration) -> Email {
    let minutes = ttl.as_secs() / 60;
    Email {
        to: to.to_string(),
        subject: format!("Your password reset token (valid for {minutes} min)"),
        body: format!(
            "Forgot your password? Submit a PATCH request with your new password and \
             password_confirm to: {reset_url}.\nIf you didn't forget your password, please ignore this email!"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_password_reset_email() {
        let email = password_reset("a@example.com", "http://localhost/reset/abc", Duration::from_secs(600));
        assert_eq!(email.to, "a@example.com");
        assert!(email.subject.contains("10 min"));
        assert!(email.body.contains("http://localhost/reset/abc"));
    }

    #[actix_web::test]
    async fn test_log_mailer_accepts_everything() {
        let email = password_reset("a@example.com", "http://x", Duration::from_secs(60));
        assert!(LogMailer.send(email).await.is_ok());
    }
}
