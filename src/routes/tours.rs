use actix_web::{HttpResponse, delete, get, patch, post, web};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::error::AppError;
use crate::middleware::{MaybeUser, Restricted};
use crate::middleware::auth::{AdminLeadGuideOrGuide, AdminOrLeadGuide};
use crate::models::dto::{ApiResponse, CreateTourRequest, DocData, UpdateTourRequest};
use crate::routes::handler_factory::{self, parse_id};
use crate::routes::reviews;
use crate::services::tour_service::{TourRepository, TourService};
use crate::utils::api_features::QueryMap;

/// GET /tours - Liste filtrée / triée / paginée (PUBLIC, session facultative)
#[get("")]
pub async fn get_all_tours(
    viewer: MaybeUser,
    db: web::Data<DatabaseConnection>,
    query: web::Query<QueryMap>,
) -> Result<HttpResponse, AppError> {
    let viewer_id = viewer.0.map(|u| u.id);
    debug!(viewer = ?viewer_id, "listing tours");
    handler_factory::get_all::<TourRepository>(db.get_ref(), None, &query).await
}

/// GET /tours/top-5-best - Alias : 5 meilleurs tours (PUBLIC)
#[get("/top-5-best")]
pub async fn top_tours(
    db: web::Data<DatabaseConnection>,
    query: web::Query<QueryMap>,
) -> Result<HttpResponse, AppError> {
    let query = TourService::top_tours_alias(query.into_inner());
    handler_factory::get_all::<TourRepository>(db.get_ref(), None, &query).await
}

/// GET /tours/tour-stats - Statistiques par difficulté (PUBLIC)
#[get("/tour-stats")]
pub async fn tour_stats(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, AppError> {
    let stats = TourService::stats(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({ "stats": stats }))))
}

/// GET /tours/busy-months/{year} - Départs par mois (guides et plus)
#[get("/busy-months/{year}")]
pub async fn busy_months(
    _user: Restricted<AdminLeadGuideOrGuide>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let raw = path.into_inner();
    let year: i32 = raw.parse().map_err(|_| AppError::Cast {
        path: "year".to_string(),
        value: raw.clone(),
    })?;

    let plan = TourService::monthly_plan(db.get_ref(), year).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(serde_json::json!({ "plan": plan }))))
}

/// GET /tours/tours-within/{distance}/center/{latlng}/unit/{unit} (PUBLIC)
#[get("/tours-within/{distance}/center/{latlng}/unit/{unit}")]
pub async fn tours_within(
    db: web::Data<DatabaseConnection>,
    path: web::Path<(String, String, String)>,
) -> Result<HttpResponse, AppError> {
    let (distance, latlng, unit) = path.into_inner();
    let distance: f64 = distance.parse().map_err(|_| AppError::Cast {
        path: "distance".to_string(),
        value: distance.clone(),
    })?;

    let tours = TourService::tours_within(db.get_ref(), distance, &latlng, &unit).await?;
    let results = tours.len();
    Ok(HttpResponse::Ok().json(ApiResponse::success(DocData { data: tours }).with_results(results)))
}

/// GET /tours/distances/{latlng}/unit/{unit} (PUBLIC)
#[get("/distances/{latlng}/unit/{unit}")]
pub async fn distances(
    db: web::Data<DatabaseConnection>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (latlng, unit) = path.into_inner();
    let distances = TourService::distances(db.get_ref(), &latlng, &unit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(DocData { data: distances })))
}

/// GET /tours/{id} - Tour + guides + reviews (PUBLIC, session facultative)
#[get("/{id}")]
pub async fn get_tour(
    viewer: MaybeUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    let viewer_id = viewer.0.map(|u| u.id);
    debug!(tour_id = id, viewer = ?viewer_id, "fetching tour");
    handler_factory::get_one::<TourRepository>(db.get_ref(), id).await
}

/// POST /tours - Créer un tour (admin / lead-guide)
#[post("")]
pub async fn create_tour(
    _user: Restricted<AdminOrLeadGuide>,
    db: web::Data<DatabaseConnection>,
    body: web::Json<CreateTourRequest>,
) -> Result<HttpResponse, AppError> {
    handler_factory::create_one::<TourRepository>(db.get_ref(), body.into_inner()).await
}

/// PATCH /tours/{id} - Modifier un tour (admin / lead-guide)
#[patch("/{id}")]
pub async fn update_tour(
    _user: Restricted<AdminOrLeadGuide>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
    body: web::Json<UpdateTourRequest>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    handler_factory::update_one::<TourRepository>(db.get_ref(), id, body.into_inner()).await
}

/// DELETE /tours/{id} - Supprimer un tour (admin / lead-guide)
#[delete("/{id}")]
pub async fn delete_tour(
    _user: Restricted<AdminOrLeadGuide>,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    handler_factory::delete_one::<TourRepository>(db.get_ref(), id).await
}

pub fn tours_routes(cfg: &mut web::ServiceConfig) {
    // Les chemins fixes avant /{id}
    cfg.service(
        web::scope("/tours")
            .service(top_tours)
            .service(tour_stats)
            .service(busy_months)
            .service(tours_within)
            .service(distances)
            .configure(reviews::nested_review_routes)
            .service(get_all_tours)
            .service(create_tour)
            .service(get_tour)
            .service(update_tour)
            .service(delete_tour)
    );
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};

    use crate::db::test_connection;
    use crate::models::users::Role;
    use crate::routes::configure_routes;
    use crate::test_utils::{bearer, insert_tour, insert_user, test_state};

    #[actix_web::test]
    async fn test_sort_by_price_desc_with_limit() {
        let db = test_connection().await;
        for (name, price) in [("Tour Priced 100", 100.0), ("Tour Priced 200", 200.0), ("Tour Priced 300", 300.0)] {
            insert_tour(&db, name, price).await;
        }
        let state = test_state(db);
        let app = test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .app_data(state.mailer.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/tours?sort=-price&limit=1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["results"], 1);
        assert_eq!(body["data"]["data"][0]["price"], 300.0);
    }

    #[actix_web::test]
    async fn test_filter_cast_error_and_unknown_page() {
        let db = test_connection().await;
        insert_tour(&db, "Only One Tour Here", 100.0).await;
        let state = test_state(db);
        let app = test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .app_data(state.mailer.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/tours?price%5Bgte%5D=abc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "Invalid price: abc");

        let req = test::TestRequest::get().uri("/api/v1/tours?page=3&limit=10").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/api/v1/tours/abc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_huge_limit_does_not_crash() {
        let db = test_connection().await;
        insert_tour(&db, "Only One Tour Here", 100.0).await;
        let state = test_state(db);
        let app = test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .app_data(state.mailer.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/tours?limit=18446744073709551615")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["results"], 1);

        let req = test::TestRequest::get()
            .uri("/api/v1/tours?page=18446744073709551615&limit=18446744073709551615")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_public_reads_accept_any_session_state() {
        let db = test_connection().await;
        let tour = insert_tour(&db, "The Park Camper Tour", 1497.0).await;
        let user = insert_user(&db, "visitor@example.com", Role::User).await;
        let state = test_state(db);
        let app = test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .app_data(state.mailer.clone())
                .configure(configure_routes),
        )
        .await;

        // jeton invalide : la lecture publique passe quand même
        let req = test::TestRequest::get()
            .uri("/api/v1/tours")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/tours/{}", tour.id))
            .insert_header(bearer(&state.config, &user))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_tour_writes_are_restricted() {
        let db = test_connection().await;
        let user = insert_user(&db, "user@example.com", Role::User).await;
        let lead = insert_user(&db, "lead@example.com", Role::LeadGuide).await;
        let state = test_state(db);
        let app = test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .app_data(state.mailer.clone())
                .configure(configure_routes),
        )
        .await;

        let payload = json!({
            "name": "The Mountain Biker",
            "duration": 4,
            "max_group_size": 8,
            "difficulty": "medium",
            "price": 1200.0,
            "summary": "Ride the ridge",
            "start_location": {"lat": 46.5, "lng": 7.9}
        });

        let req = test::TestRequest::post().uri("/api/v1/tours").set_json(&payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/v1/tours")
            .insert_header(bearer(&state.config, &user))
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/api/v1/tours")
            .insert_header(bearer(&state.config, &lead))
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["data"]["slug"], "the-mountain-biker");
        assert_eq!(body["data"]["data"]["ratings_average"], 4.7);

        let id = body["data"]["data"]["id"].as_i64().unwrap();
        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/tours/{id}"))
            .insert_header(bearer(&state.config, &lead))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri(&format!("/api/v1/tours/{id}")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "No tour found with that ID");
    }

    #[actix_web::test]
    async fn test_top_tours_alias_projection() {
        let db = test_connection().await;
        for i in 0..7 {
            insert_tour(&db, &format!("Alias Tour Number {i}"), 100.0 + f64::from(i)).await;
        }
        let state = test_state(db);
        let app = test::init_service(
            App::new()
                .app_data(state.db.clone())
                .app_data(state.config.clone())
                .app_data(state.mailer.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/tours/top-5-best").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["results"], 5);
        let first = &body["data"]["data"][0];
        assert_eq!(first["price"], 100.0);
        assert!(first.get("summary").is_some());
        assert!(first.get("duration").is_none());
    }
}
