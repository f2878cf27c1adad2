// ============================================================================
// ROUTES - MONTAGE SOUS /api/v1
// ============================================================================
//
//   /api/v1/health
//   /api/v1/tours     (+ /tours/{tour_id}/reviews)
//   /api/v1/reviews
//   /api/v1/users
//
// Les erreurs des extracteurs (JSON, query, path) et les routes inconnues
// passent par AppError : même enveloppe que les erreurs métier.
//
// ============================================================================

pub mod handler_factory;
pub mod health;
pub mod reviews;
pub mod tours;
pub mod users;

use actix_web::{HttpRequest, HttpResponse, web};

use crate::error::AppError;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(10 * 1024)
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid JSON body: {err}")).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid query string: {err}")).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid path: {err}")).into())
}

async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound(format!(
        "Can't find {} on this server!",
        req.path()
    )))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(
            web::scope("/api/v1")
                .service(health::health_check)
                .configure(tours::tours_routes)
                .configure(reviews::reviews_routes)
                .configure(users::users_routes)
        )
        .default_service(web::route().to(not_found));
}
