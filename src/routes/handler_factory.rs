// ============================================================================
// HANDLER FACTORY - CRUD GÉNÉRIQUE
// ============================================================================
//
// Les cinq opérations communes à toutes les ressources, paramétrées par un
// Repository. Les routes de chaque ressource (tours.rs, reviews.rs,
// users.rs) ne font qu'extraire les paramètres et appeler ces fonctions.
//
//   get_all    -> 200 {status, results, data: {data: [...]}}
//   get_one    -> 200 {status, data: {data: {...}}}      | 404
//   create_one -> 201 {status, data: {data: {...}}}
//   update_one -> 200 {status, data: {data: {...}}}      | 404
//   delete_one -> 204 (corps vide)                       | 404
//
// Aucune de ces fonctions ne distingue les erreurs : tout remonte en
// AppError jusqu'au rendu (error.rs).
//
// ============================================================================

use actix_web::HttpResponse;
use sea_orm::DatabaseConnection;
use validator::Validate;

use crate::error::AppError;
use crate::models::dto::{ApiResponse, DocData};
use crate::services::repository::Repository;
use crate::utils::api_features::{ApiFeatures, QueryMap};

/// Identifiant de chemin : "abc" -> Cast (400)
pub fn parse_id(raw: &str) -> Result<i32, AppError> {
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Cast {
            path: "id".to_string(),
            value: raw.to_string(),
        })
}

pub async fn get_all<R: Repository>(
    db: &DatabaseConnection,
    parent: Option<i32>,
    query: &QueryMap,
) -> Result<HttpResponse, AppError> {
    let rows = ApiFeatures::new(R::base_query(parent), query)
        .filter()?
        .sort()?
        .limit_fields()?
        .paginate()
        .fetch(db)
        .await?;
    let rows = R::populate(db, rows).await?;

    let results = rows.len();
    Ok(HttpResponse::Ok().json(ApiResponse::success(DocData { data: rows }).with_results(results)))
}

pub async fn get_one<R: Repository>(db: &DatabaseConnection, id: i32) -> Result<HttpResponse, AppError> {
    let doc = R::find_one(db, id)
        .await?
        .ok_or_else(|| AppError::no_document(R::LABEL))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(DocData { data: doc })))
}

pub async fn create_one<R: Repository>(
    db: &DatabaseConnection,
    input: R::Create,
) -> Result<HttpResponse, AppError> {
    input.validate()?;
    let doc = R::create(db, input).await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(DocData { data: doc })))
}

pub async fn update_one<R: Repository>(
    db: &DatabaseConnection,
    id: i32,
    input: R::Update,
) -> Result<HttpResponse, AppError> {
    input.validate()?;
    let doc = R::update(db, id, input)
        .await?
        .ok_or_else(|| AppError::no_document(R::LABEL))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(DocData { data: doc })))
}

pub async fn delete_one<R: Repository>(db: &DatabaseConnection, id: i32) -> Result<HttpResponse, AppError> {
    if !R::delete(db, id).await? {
        return Err(AppError::no_document(R::LABEL));
    }

    Ok(HttpResponse::NoContent().finish())
}
