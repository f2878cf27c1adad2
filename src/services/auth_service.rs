// ============================================================================
// AUTH - SESSIONS, MOTS DE PASSE, RÉINITIALISATION
// ============================================================================
//
// Une session est un JWT signé (HS256) portant l'id de l'utilisateur.
// Il est rendu dans le corps de la réponse ET dans le cookie "jwt".
//
// Validation d'une session (resolve_session), dans cet ordre:
//   1. signature + expiration du token
//   2. adresse du client si SESSION_BIND_IP est actif
//   3. l'utilisateur existe toujours et est actif
//   4. le mot de passe n'a pas changé depuis l'émission du token
//
// Réinitialisation:
//   - seul le SHA-256 du token est stocké, avec une date d'expiration
//   - si l'email ne part pas, le token stocké est effacé
//
// ============================================================================

use chrono::Utc;
use sea_orm::*;
use tracing::{info, warn};
use validator::Validate;

use crate::config::Config;
use crate::error::AppError;
use crate::models::dto::{ResetPasswordRequest, SignupRequest, UpdatePasswordRequest};
use crate::models::users;
use crate::services::email::{self, Mailer};
use crate::services::repository::Repository;
use crate::services::user_service::{UserRepository, UserService};
use crate::utils::{jwt, password, reset_token};

pub struct AuthService;

impl AuthService {
    pub fn issue_token(config: &Config, user_id: i32, ip: Option<String>) -> Result<String, AppError> {
        let ip = if config.session_bind_ip { ip } else { None };
        jwt::generate_token(user_id, &config.jwt_secret, config.jwt_expires_in, ip)
    }

    pub async fn signup(db: &DatabaseConnection, input: SignupRequest) -> Result<users::Model, AppError> {
        input.validate()?;
        let user = UserRepository::create(db, input).await?;
        info!(user_id = user.id, "new account");
        Ok(user)
    }

    pub async fn login(
        db: &DatabaseConnection,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<users::Model, AppError> {
        // 1. Les deux champs sont obligatoires
        let (Some(email), Some(password)) = (email, password) else {
            return Err(AppError::BadRequest("Please provide email and password!".to_string()));
        };
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::BadRequest("Please provide email and password!".to_string()));
        }

        // 2. Même réponse pour un email inconnu et un mauvais mot de passe
        let Some(user) = UserService::find_active_by_email(db, email).await? else {
            return Err(AppError::InvalidCredentials);
        };

        let valid = password::verify_password_blocking(password.to_string(), user.password.clone()).await?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Retrouve l'utilisateur courant à partir d'un token de session
    pub async fn resolve_session(
        db: &DatabaseConnection,
        config: &Config,
        token: &str,
        client_ip: Option<&str>,
    ) -> Result<users::Model, AppError> {
        // 1. Signature et expiration
        let claims = jwt::verify_token(token, &config.jwt_secret)?;

        // 2. Session liée à une adresse
        if config.session_bind_ip && claims.ip.as_deref() != client_ip {
            warn!(user_id = claims.sub, "session used from another address");
            return Err(AppError::Unauthenticated(
                "This session belongs to another client. Please log in again.".to_string(),
            ));
        }

        // 3. L'utilisateur existe toujours
        let Some(user) = UserService::find_active_by_id(db, claims.sub).await? else {
            return Err(AppError::Unauthenticated(
                "The user belonging to this token does no longer exist.".to_string(),
            ));
        };

        // 4. Mot de passe inchangé depuis l'émission
        if user.changed_password_after(claims.iat_ms) {
            return Err(AppError::Unauthenticated(
                "User recently changed password! Please log in again.".to_string(),
            ));
        }

        Ok(user)
    }

    /// Génère un token de réinitialisation et l'envoie par email.
    /// `reset_url` reçoit le token brut et retourne le lien à envoyer.
    pub async fn forgot_password(
        db: &DatabaseConnection,
        config: &Config,
        mailer: &dyn Mailer,
        email: &str,
        reset_url: impl Fn(&str) -> String,
    ) -> Result<(), AppError> {
        let Some(user) = UserService::find_active_by_email(db, email).await? else {
            return Err(AppError::NotFound("There is no user with that email address.".to_string()));
        };

        let ttl = chrono::Duration::from_std(config.reset_token_ttl)
            .map_err(|e| AppError::Unexpected(format!("Invalid reset token lifetime: {e}")))?;
        let token = reset_token::generate();

        let to = user.email.clone();
        let mut active: users::ActiveModel = user.into();
        active.password_reset_token = Set(Some(token.hashed));
        active.password_reset_expires = Set(Some(Utc::now() + ttl));
        let user = active.update(db).await?;

        let message = email::password_reset(&to, &reset_url(&token.raw), config.reset_token_ttl);
        if let Err(e) = mailer.send(message).await {
            warn!(user_id = user.id, error = %e, "reset email failed, clearing token");

            let mut active: users::ActiveModel = user.into();
            active.password_reset_token = Set(None);
            active.password_reset_expires = Set(None);
            active.update(db).await?;

            return Err(AppError::Internal(
                "There was an error sending the email. Try again later!".to_string(),
            ));
        }

        Ok(())
    }

    pub async fn reset_password(
        db: &DatabaseConnection,
        raw_token: &str,
        input: ResetPasswordRequest,
    ) -> Result<users::Model, AppError> {
        // 1. Token connu et non expiré
        let user = UserRepository::base_query(None)
            .filter(users::Column::PasswordResetToken.eq(reset_token::hash(raw_token)))
            .filter(users::Column::PasswordResetExpires.gt(Utc::now()))
            .one(db)
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)?;

        // 2. Nouveau mot de passe
        input.validate()?;
        let hash = password::hash_password_blocking(input.password).await?;

        // 3. Token consommé, changement horodaté
        let mut active: users::ActiveModel = user.into();
        active.password = Set(hash);
        active.password_changed_at = Set(Some(Utc::now()));
        active.password_reset_token = Set(None);
        active.password_reset_expires = Set(None);
        let user = active.update(db).await?;

        info!(user_id = user.id, "password reset");
        Ok(user)
    }

    pub async fn update_password(
        db: &DatabaseConnection,
        user: users::Model,
        input: UpdatePasswordRequest,
    ) -> Result<users::Model, AppError> {
        let valid =
            password::verify_password_blocking(input.password_current.clone(), user.password.clone()).await?;
        if !valid {
            return Err(AppError::Unauthenticated("Your current password is wrong.".to_string()));
        }

        input.validate()?;
        let hash = password::hash_password_blocking(input.password).await?;

        let mut active: users::ActiveModel = user.into();
        active.password = Set(hash);
        active.password_changed_at = Set(Some(Utc::now()));
        Ok(active.update(db).await?)
    }
}
