use actix_web::{HttpResponse, delete, get, patch, post, web};
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::middleware::auth::{UserOnly, UserOrAdmin};
use crate::middleware::{AuthUser, Restricted};
use crate::models::dto::{CreateReviewRequest, NewReview, UpdateReviewRequest};
use crate::models::reviews::DEFAULT_RATING;
use crate::routes::handler_factory::{self, parse_id};
use crate::services::review_service::ReviewRepository;
use crate::utils::api_features::QueryMap;

/// Review prête à persister : l'auteur est toujours l'utilisateur courant
fn new_review(body: CreateReviewRequest, tour_id: Option<i32>, user_id: i32) -> Result<NewReview, AppError> {
    let tour_id = tour_id
        .or(body.tour)
        .ok_or_else(|| AppError::Validation("Review must belong to a tour.".to_string()))?;

    Ok(NewReview {
        review: body.review,
        rating: body.rating.unwrap_or(DEFAULT_RATING),
        tour_id,
        user_id,
    })
}

/// GET /reviews (AUTH)
#[get("")]
pub async fn get_all_reviews(
    _user: AuthUser,
    db: web::Data<DatabaseConnection>,
    query: web::Query<QueryMap>,
) -> Result<HttpResponse, AppError> {
    handler_factory::get_all::<ReviewRepository>(db.get_ref(), None, &query).await
}

/// POST /reviews - tour dans le corps (role user)
#[post("")]
pub async fn create_review(
    user: Restricted<UserOnly>,
    db: web::Data<DatabaseConnection>,
    body: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let input = new_review(body.into_inner(), None, user.user.id)?;
    handler_factory::create_one::<ReviewRepository>(db.get_ref(), input).await
}

/// GET /reviews/{id} (AUTH)
#[get("/{id}")]
pub async fn get_review(
    _user: AuthUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    handler_factory::get_one::<ReviewRepository>(db.get_ref(), id).await
}

/// PATCH /reviews/{id} (user / admin)
#[patch("/{id}")]
pub async fn update_review(
    _user: Restricted<UserOrAdmin>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    body: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    handler_factory::update_one::<ReviewRepository>(db.get_ref(), id, body.into_inner()).await
}

/// DELETE /reviews/{id} (user / admin)
#[delete("/{id}")]
pub async fn delete_review(
    _user: Restricted<UserOrAdmin>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    handler_factory::delete_one::<ReviewRepository>(db.get_ref(), id).await
}

/// GET /tours/{tour_id}/reviews (AUTH)
#[get("/{tour_id}/reviews")]
pub async fn get_tour_reviews(
    _user: AuthUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    query: web::Query<QueryMap>,
) -> Result<HttpResponse, AppError> {
    let tour_id = parse_id(&path)?;
    handler_factory::get_all::<ReviewRepository>(db.get_ref(), Some(tour_id), &query).await
}

/// POST /tours/{tour_id}/reviews - tour pris dans le chemin (role user)
#[post("/{tour_id}/reviews")]
pub async fn create_tour_review(
    user: Restricted<UserOnly>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    body: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let tour_id = parse_id(&path)?;
    let input = new_review(body.into_inner(), Some(tour_id), user.user.id)?;
    handler_factory::create_one::<ReviewRepository>(db.get_ref(), input).await
}

pub fn reviews_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reviews")
            .service(get_all_reviews)
            .service(create_review)
            .service(get_review)
            .service(update_review)
            .service(delete_review)
    );
}

/// Monté dans le scope /tours
pub fn nested_review_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_tour_reviews).service(create_tour_review);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;
    use actix_web::{App, http::StatusCode};
    use serde_json::{Value, json};

    use crate::db::test_connection;
    use crate::models::users::Role;
    use crate::routes::configure_routes;
    use crate::test_utils::{bearer, insert_tour, insert_user, test_state};

    #[test]
    fn test_path_tour_wins_over_body() {
        let body = CreateReviewRequest {
            review: "Great".to_string(),
            rating: None,
            tour: Some(7),
        };
        let review = new_review(body, Some(3), 1).unwrap();
        assert_eq!(review.tour_id, 3);
        assert_eq!(review.rating, DEFAULT_RATING);

        let orphan = CreateReviewRequest {
            review: "Great".to_string(),
            rating: Some(4.0),
            tour: None,
        };
        assert!(new_review(orphan, None, 1).is_err());
    }

    #[actix_web::test]
    async fn test_nested_review_flow() {
        let db = test_connection().await;
        let tour = insert_tour(&db, "The Lake Excursion", 597.0).await;
        let user = insert_user(&db, "reviewer@example.com", Role::User).await;
        let guide = insert_user(&db, "guide@example.com", Role::Guide).await;
        let state = test_state(db);
        let app = actix_test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .app_data(state.mailer.clone())
                .configure(configure_routes),
        )
        .await;
        let uri = format!("/api/v1/tours/{}/reviews", tour.id);

        // un guide ne peut pas écrire de review
        let req = actix_test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&state.config, &guide))
            .set_json(json!({"review": "Nice", "rating": 5}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&state.config, &user))
            .set_json(json!({"review": "Loved it", "rating": 4}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        // une seule review par couple (tour, user)
        let req = actix_test::TestRequest::post()
            .uri(&uri)
            .insert_header(bearer(&state.config, &user))
            .set_json(json!({"review": "Again", "rating": 5}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["status"], "fail");
        assert!(body["message"].as_str().unwrap().starts_with("Duplicate field value"));

        let req = actix_test::TestRequest::get()
            .uri(&uri)
            .insert_header(bearer(&state.config, &user))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["results"], 1);
        assert_eq!(body["data"]["data"][0]["user"]["name"], user.name.as_str());

        let req = actix_test::TestRequest::get().uri(&format!("/api/v1/tours/{}", tour.id)).to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["data"]["ratings_quantity"], 1);
        assert_eq!(body["data"]["data"]["reviews"][0]["review"], "Loved it");
    }

    #[actix_web::test]
    async fn test_reviews_require_login_and_valid_rating() {
        let db = test_connection().await;
        let tour = insert_tour(&db, "The Canyon Trekker", 697.0).await;
        let user = insert_user(&db, "rating@example.com", Role::User).await;
        let state = test_state(db);
        let app = actix_test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .app_data(state.mailer.clone())
                .configure(configure_routes),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/api/v1/reviews").to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/reviews")
            .insert_header(bearer(&state.config, &user))
            .set_json(json!({"review": "Too good", "rating": 9, "tour": tour.id}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "Invalid input data: Rating must be between 1 and 5");

        let req = actix_test::TestRequest::post()
            .uri("/api/v1/reviews")
            .insert_header(bearer(&state.config, &user))
            .set_json(json!({"review": "Lost", "rating": 3, "tour": 9999}))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
