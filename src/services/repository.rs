// ============================================================================
// REPOSITORY - INTERFACE COMMUNE DES RESSOURCES
// ============================================================================
//
// Chaque entité exposée en CRUD (tours, reviews, users) implémente ce trait.
// routes/handler_factory.rs s'appuie uniquement dessus.
//
// Ce qui était implicite côté ORM devient explicite ici:
//   - base_query : exclusions systématiques (tours secrets, users inactifs)
//                  et portée parent (reviews d'un tour)
//   - populate   : résolution des références dans les listings
//   - create / update / delete : slug, recalcul des notes, etc. sont
//                  appelés dans l'implémentation, après l'écriture
//
// ============================================================================

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait, Select};
use serde::Serialize;
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::error::AppError;
use crate::utils::api_features::ApiResource;

#[async_trait]
pub trait Repository {
    type Entity: ApiResource;
    type Model: Serialize + Send;
    /// Document retourné par get_one, références résolues
    type Detail: Serialize + Send;
    type Create: Validate + Send + 'static;
    type Update: Validate + Send + 'static;

    /// Nom utilisé dans les messages d'erreur ("No tour found with that ID")
    const LABEL: &'static str;

    fn base_query(_parent: Option<i32>) -> Select<Self::Entity> {
        Self::Entity::find()
    }

    async fn populate(
        _db: &DatabaseConnection,
        rows: Vec<JsonValue>,
    ) -> Result<Vec<JsonValue>, AppError> {
        Ok(rows)
    }

    async fn find_one(db: &DatabaseConnection, id: i32) -> Result<Option<Self::Detail>, AppError>;

    async fn create(db: &DatabaseConnection, input: Self::Create) -> Result<Self::Model, AppError>;

    async fn update(
        db: &DatabaseConnection,
        id: i32,
        input: Self::Update,
    ) -> Result<Option<Self::Model>, AppError>;

    /// false si aucun document ne correspond
    async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, AppError>;
}
