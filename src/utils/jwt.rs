use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,    // user_id
    pub iat: i64,    // émission (secondes)
    pub iat_ms: i64, // émission (millisecondes) - comparée à password_changed_at
    pub exp: i64,    // expiration (secondes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>, // adresse du client si SESSION_BIND_IP
}

/// Génère un token de session pour un utilisateur
pub fn generate_token(
    user_id: i32,
    secret: &str,
    expires_in: Duration,
    ip: Option<String>,
) -> Result<String, AppError> {
    generate_token_at(user_id, secret, expires_in, ip, Utc::now())
}

pub fn generate_token_at(
    user_id: i32,
    secret: &str,
    expires_in: Duration,
    ip: Option<String>,
    issued_at: DateTime<Utc>,
) -> Result<String, AppError> {
    let lifetime = chrono::Duration::from_std(expires_in)
        .map_err(|e| AppError::Unexpected(format!("Invalid token lifetime: {e}")))?;
    let expiration = issued_at
        .checked_add_signed(lifetime)
        .ok_or_else(|| AppError::Unexpected("Failed to calculate expiration".to_string()))?;

    let claims = Claims {
        sub: user_id,
        iat: issued_at.timestamp(),
        iat_ms: issued_at.timestamp_millis(),
        exp: expiration.timestamp(),
        ip,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

/// Vérifie signature + expiration et décode le token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_generate_and_verify_token() {
        let token = generate_token(123, SECRET, Duration::from_secs(3600), None).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, 123);
        assert!(claims.ip.is_none());
        assert_eq!(claims.iat, claims.iat_ms / 1000);
    }

    #[test]
    fn test_invalid_token() {
        let err = verify_token("invalid.token.here", SECRET).unwrap_err();
        assert_eq!(actix_web::ResponseError::status_code(&err), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_wrong_secret() {
        let token = generate_token(1, SECRET, Duration::from_secs(3600), None).unwrap();
        assert!(verify_token(&token, "another-secret").is_err());
    }

    #[test]
    fn test_expired_token() {
        let issued = Utc::now() - chrono::Duration::hours(2);
        let token = generate_token_at(1, SECRET, Duration::from_secs(3600), None, issued).unwrap();

        let err = verify_token(&token, SECRET).unwrap_err();
        assert!(matches!(err.translate(), Some(AppError::TokenExpired)));
    }
}
