use std::marker::PhantomData;

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use futures::future::{LocalBoxFuture, Ready, ready};
use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::error::AppError;
use crate::models::users::{self, Role};
use crate::services::auth_service::AuthService;

pub const SESSION_COOKIE: &str = "jwt";

/// Utilisateur authentifié (extracteur des routes protégées)
#[derive(Debug, Clone)]
pub struct AuthUser(pub users::Model);

/// Utilisateur courant s'il y en a un, sans jamais échouer
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<users::Model>);

/// Ensemble de rôles autorisés sur une route
pub trait RolePolicy {
    const ROLES: &'static [Role];
}

pub struct AdminOnly;
impl RolePolicy for AdminOnly {
    const ROLES: &'static [Role] = &[Role::Admin];
}

pub struct AdminOrLeadGuide;
impl RolePolicy for AdminOrLeadGuide {
    const ROLES: &'static [Role] = &[Role::Admin, Role::LeadGuide];
}

pub struct AdminLeadGuideOrGuide;
impl RolePolicy for AdminLeadGuideOrGuide {
    const ROLES: &'static [Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
}

pub struct UserOnly;
impl RolePolicy for UserOnly {
    const ROLES: &'static [Role] = &[Role::User];
}

pub struct UserOrAdmin;
impl RolePolicy for UserOrAdmin {
    const ROLES: &'static [Role] = &[Role::User, Role::Admin];
}

/// Utilisateur authentifié ET dont le rôle est dans P::ROLES
pub struct Restricted<P: RolePolicy> {
    pub user: users::Model,
    _policy: PhantomData<P>,
}

/// Adresse du client, utilisée si SESSION_BIND_IP est actif
pub fn client_ip(req: &HttpRequest) -> Option<String> {
    req.peer_addr().map(|addr| addr.ip().to_string())
}

/// 1. header "Authorization: Bearer <token>"  2. cookie "jwt"
fn extract_token(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    from_header.or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()))
}

async fn authenticate(req: HttpRequest) -> Result<users::Model, AppError> {
    let Some(token) = extract_token(&req) else {
        return Err(AppError::Unauthenticated(
            "You are not logged in! Please log in to get access.".to_string(),
        ));
    };

    let db = req
        .app_data::<web::Data<DatabaseConnection>>()
        .cloned()
        .ok_or_else(|| AppError::Unexpected("Database connection is not configured".to_string()))?;
    let config = req
        .app_data::<web::Data<Config>>()
        .cloned()
        .ok_or_else(|| AppError::Unexpected("Configuration is not registered".to_string()))?;

    let ip = client_ip(&req);
    AuthService::resolve_session(db.get_ref(), config.get_ref(), &token, ip.as_deref()).await
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { authenticate(req).await.map(AuthUser) })
    }
}

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move { Ok(MaybeUser(authenticate(req).await.ok())) })
    }
}

impl<P: RolePolicy + 'static> FromRequest for Restricted<P> {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let user = authenticate(req).await?;
            if !P::ROLES.contains(&user.role) {
                return Err(AppError::Forbidden);
            }
            Ok(Restricted {
                user,
                _policy: PhantomData,
            })
        })
    }
}

/// Adresse du client, extraite une fois par handler
pub struct ClientIp(pub Option<String>);

impl FromRequest for ClientIp {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(ClientIp(client_ip(req))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::HttpResponse;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    use crate::db::test_connection;
    use crate::test_utils::{bearer, insert_user, test_state};

    #[test]
    fn test_token_from_header_wins_over_cookie() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer header-token"))
            .cookie(Cookie::new(SESSION_COOKIE, "cookie-token"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("header-token"));
    }

    #[test]
    fn test_token_from_cookie() {
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, "cookie-token"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("cookie-token"));
    }

    async fn whoami(user: MaybeUser) -> HttpResponse {
        HttpResponse::Ok().json(user.0.map(|u| u.email))
    }

    #[actix_web::test]
    async fn test_maybe_user_never_fails() {
        use actix_web::{App, test};

        let db = test_connection().await;
        let user = insert_user(&db, "maybe@example.com", Role::User).await;
        let state = test_state(db);
        let app = test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.is_null());

        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(SESSION_COOKIE, "loggedout"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.is_null());

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(bearer(&state.config, &user))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, "maybe@example.com");
    }

    #[test]
    fn test_no_token() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert!(extract_token(&req).is_none());
    }
}
