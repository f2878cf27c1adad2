use actix_web::cookie::{Cookie, time::Duration as CookieDuration};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, web};
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::auth::{AdminOnly, ClientIp, SESSION_COOKIE};
use crate::middleware::{AuthUser, Restricted};
use crate::models::dto::{
    ApiResponse, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest,
    UpdateMeRequest, UpdatePasswordRequest, UpdateUserRequest, UserData,
};
use crate::models::users;
use crate::routes::handler_factory::{self, parse_id};
use crate::services::auth_service::AuthService;
use crate::services::email::Mailer;
use crate::services::user_service::{UserRepository, UserService};
use crate::utils::api_features::QueryMap;

/// Réponse d'auth : token dans le corps ET dans le cookie httpOnly "jwt"
fn send_token(
    status: StatusCode,
    user: users::Model,
    config: &Config,
    ip: Option<String>,
) -> Result<HttpResponse, AppError> {
    let token = AuthService::issue_token(config, user.id, ip)?;

    let cookie = Cookie::build(SESSION_COOKIE, token.clone())
        .path("/")
        .http_only(true)
        .secure(config.is_production())
        .max_age(CookieDuration::days(config.jwt_cookie_expires_in_days))
        .finish();

    Ok(HttpResponse::build(status)
        .cookie(cookie)
        .json(ApiResponse::success(UserData { user }).with_token(token)))
}

// ----------------------------------------------------------------------------
// AUTH (PUBLIC)
// ----------------------------------------------------------------------------

/// POST /users/signup - Créer un compte
#[post("/signup")]
pub async fn signup(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    ip: ClientIp,
    body: web::Json<SignupRequest>,
) -> Result<HttpResponse, AppError> {
    let user = AuthService::signup(db.get_ref(), body.into_inner()).await?;
    send_token(StatusCode::CREATED, user, &config, ip.0)
}

/// POST /users/login - Se connecter
#[post("/login")]
pub async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    ip: ClientIp,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let user = AuthService::login(db.get_ref(), body.email.as_deref(), body.password.as_deref()).await?;
    send_token(StatusCode::OK, user, &config, ip.0)
}

/// GET /users/logout - Remplace le cookie par une valeur expirant sous 10 s
#[get("/logout")]
pub async fn logout(_user: AuthUser) -> HttpResponse {
    let cookie = Cookie::build(SESSION_COOKIE, "loggedout")
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::seconds(10))
        .finish();

    HttpResponse::Ok()
        .cookie(cookie)
        .json(serde_json::json!({ "status": "success" }))
}

/// POST /users/forgotPassword - Envoie un lien de réinitialisation
#[post("/forgotPassword")]
pub async fn forgot_password(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    mailer: web::Data<dyn Mailer>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let base = {
        let info = req.connection_info();
        format!("{}://{}/api/v1/users/resetPassword", info.scheme(), info.host())
    };

    AuthService::forgot_password(db.get_ref(), &config, mailer.get_ref(), &body.email, |token| {
        format!("{base}/{token}")
    })
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Token sent to email!")))
}

/// PATCH /users/resetPassword/{token}
#[patch("/resetPassword/{token}")]
pub async fn reset_password(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    ip: ClientIp,
    path: web::Path<String>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let user = AuthService::reset_password(db.get_ref(), &path, body.into_inner()).await?;
    send_token(StatusCode::OK, user, &config, ip.0)
}

// ----------------------------------------------------------------------------
// COMPTE COURANT (AUTH)
// ----------------------------------------------------------------------------

/// PATCH /users/updatePassword
#[patch("/updatePassword")]
pub async fn update_password(
    user: AuthUser,
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    ip: ClientIp,
    body: web::Json<UpdatePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let user = AuthService::update_password(db.get_ref(), user.0, body.into_inner()).await?;
    send_token(StatusCode::OK, user, &config, ip.0)
}

/// GET /users/me
#[get("/me")]
pub async fn get_me(user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    handler_factory::get_one::<UserRepository>(db.get_ref(), user.0.id).await
}

/// PATCH /users/updateMe - name / email / photo
#[patch("/updateMe")]
pub async fn update_me(
    user: AuthUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<UpdateMeRequest>,
) -> Result<HttpResponse, AppError> {
    let input = body.into_inner();
    if !input.touches_password() {
        input.validate()?;
    }

    let user = UserService::update_me(db.get_ref(), user.0, input).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(UserData { user })))
}

/// DELETE /users/deleteMe - Désactive le compte
#[delete("/deleteMe")]
pub async fn delete_me(user: AuthUser, db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    UserService::deactivate(db.get_ref(), user.0.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ----------------------------------------------------------------------------
// ADMINISTRATION (ADMIN)
// ----------------------------------------------------------------------------

/// GET /users
#[get("")]
pub async fn get_all_users(
    _admin: Restricted<AdminOnly>,
    db: web::Data<DatabaseConnection>,
    query: web::Query<QueryMap>,
) -> Result<HttpResponse, AppError> {
    handler_factory::get_all::<UserRepository>(db.get_ref(), None, &query).await
}

/// POST /users - n'existe pas : les comptes se créent via /signup
#[post("")]
pub async fn create_user(_admin: Restricted<AdminOnly>) -> Result<HttpResponse, AppError> {
    Err(AppError::Internal(
        "This route is not defined! Please use /signup instead".to_string(),
    ))
}

/// GET /users/{id}
#[get("/{id}")]
pub async fn get_user(
    _admin: Restricted<AdminOnly>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    handler_factory::get_one::<UserRepository>(db.get_ref(), id).await
}

/// PATCH /users/{id} - jamais de mot de passe ici
#[patch("/{id}")]
pub async fn update_user(
    _admin: Restricted<AdminOnly>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    handler_factory::update_one::<UserRepository>(db.get_ref(), id, body.into_inner()).await
}

/// DELETE /users/{id} - suppression définitive
#[delete("/{id}")]
pub async fn delete_user(
    _admin: Restricted<AdminOnly>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    handler_factory::delete_one::<UserRepository>(db.get_ref(), id).await
}

pub fn users_routes(cfg: &mut web::ServiceConfig) {
    // Les chemins fixes avant /{id}
    cfg.service(
        web::scope("/users")
            .service(signup)
            .service(login)
            .service(logout)
            .service(forgot_password)
            .service(reset_password)
            .service(update_password)
            .service(get_me)
            .service(update_me)
            .service(delete_me)
            .service(get_all_users)
            .service(create_user)
            .service(get_user)
            .service(update_user)
            .service(delete_user)
    );
}
