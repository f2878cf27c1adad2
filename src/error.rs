// ============================================================================
// ERREURS - NORMALISATION ET RENDU
// ============================================================================
//
// Description:
//   Toutes les fonctions métier retournent Result<_, AppError>. Aucune ne
//   construit de réponse HTTP d'erreur elle-même : actix appelle
//   ResponseError::error_response, qui passe par render().
//
// Classification:
//   - Opérationnelle : erreur attendue, message affichable au client
//     (mauvaise saisie, 404, 401, 403, validation, token invalide...)
//   - Non opérationnelle : bug ou panne (DbErr brut, erreur interne).
//     En production le client ne reçoit qu'un message générique.
//
// Traductions (avant le rendu, dans les deux modes):
//   - violation d'unicité SQL      -> Duplicate (400)
//   - violation de clé étrangère   -> BadRequest (400)
//   - JWT expiré                   -> TokenExpired (401)
//   - autre erreur JWT             -> InvalidToken (401)
//
// ============================================================================

use std::sync::OnceLock;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use sea_orm::{DbErr, SqlErr};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error};
use validator::ValidationErrors;

use crate::config::Environment;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Fixe le mode de rendu des erreurs (appelé une fois au démarrage)
pub fn init_environment(environment: Environment) {
    let _ = ENVIRONMENT.set(environment);
}

fn current_environment() -> Environment {
    ENVIRONMENT.get().copied().unwrap_or(Environment::Production)
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid {path}: {value}")]
    Cast { path: String, value: String },

    #[error("Invalid input data: {0}")]
    Validation(String),

    #[error("Duplicate field value: {0}. Please use another value!")]
    Duplicate(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("Invalid session. Please log in again!")]
    InvalidToken,

    #[error("Your session has expired. Please log in again!")]
    TokenExpired,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Token is invalid or has expired")]
    InvalidOrExpiredToken,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("This page does not exist")]
    PageOutOfRange,

    /// Erreur serveur prévue, au message sûr (ex: échec d'envoi d'email)
    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] DbErr),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    pub fn no_document(label: &str) -> Self {
        AppError::NotFound(format!("No {label} found with that ID"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::Cast { .. }
            | AppError::Validation(_)
            | AppError::Duplicate(_)
            | AppError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_)
            | AppError::InvalidToken
            | AppError::TokenExpired
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::PageOutOfRange => StatusCode::NOT_FOUND,
            AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Jwt(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            AppError::Database(_) | AppError::Jwt(_) | AppError::Unexpected(_)
        )
    }

    /// Traduit les formes d'erreur connues de la couche persistance / JWT
    /// en erreur opérationnelle. None si rien à traduire.
    pub fn translate(&self) -> Option<AppError> {
        match self {
            AppError::Database(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(msg)) => {
                    Some(AppError::Duplicate(duplicate_field(&msg)))
                }
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => Some(AppError::BadRequest(
                    "Invalid reference: the related document does not exist".to_string(),
                )),
                _ => None,
            },
            AppError::Jwt(e) => match e.kind() {
                JwtErrorKind::ExpiredSignature => Some(AppError::TokenExpired),
                _ => Some(AppError::InvalidToken),
            },
            _ => None,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let messages: Vec<String> = fields
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();

        AppError::Validation(messages.join(". "))
    }
}

/// Extrait le(s) champ(s) fautif(s) du message de la base
/// - SQLite  : "UNIQUE constraint failed: users.email"
/// - Postgres: "duplicate key value violates unique constraint \"users_email_key\""
fn duplicate_field(message: &str) -> String {
    if let Some((_, cols)) = message.split_once("constraint failed: ") {
        return cols
            .split(',')
            .map(|c| c.trim().rsplit('.').next().unwrap_or(c).to_string())
            .collect::<Vec<_>>()
            .join(", ");
    }

    let quoted: Vec<&str> = message.split('"').collect();
    if quoted.len() >= 3 {
        return quoted[1].to_string();
    }

    message.to_string()
}

fn status_label(status: StatusCode) -> &'static str {
    if status.is_client_error() { "fail" } else { "error" }
}

fn source_chain(err: &AppError) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut current = std::error::Error::source(err);
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}

/// Rendu d'une erreur selon le mode. Fonction pure : testable sans serveur.
pub fn render(err: &AppError, environment: Environment) -> (StatusCode, Value) {
    let translated = err.translate();
    let effective = translated.as_ref().unwrap_or(err);
    let status = effective.status();

    match environment {
        Environment::Development => (
            status,
            json!({
                "status": status_label(status),
                "message": effective.to_string(),
                "error": format!("{err:?}"),
                "stack": source_chain(err),
            }),
        ),
        Environment::Production if effective.is_operational() => (
            status,
            json!({
                "status": status_label(status),
                "message": effective.to_string(),
            }),
        ),
        Environment::Production => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "status": "error",
                "message": "Something went very wrong!",
            }),
        ),
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.translate().as_ref().unwrap_or(self).status()
    }

    fn error_response(&self) -> HttpResponse {
        let operational = self.translate().is_some() || self.is_operational();
        if operational {
            debug!(error = %self, "operational error");
        } else {
            error!(error = ?self, "unexpected error");
        }

        let (status, body) = render(self, current_environment());
        HttpResponse::build(status).json(body)
    }
}
