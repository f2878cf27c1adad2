// ============================================================================
// MODÈLE : TOURS
// ============================================================================
//
// Colonnes de la table tours:
//   - id (INTEGER, PRIMARY KEY)
//   - name (VARCHAR, UNIQUE) - 10 à 40 caractères
//   - slug (VARCHAR) - dérivé du nom à chaque sauvegarde
//   - ratings_average / ratings_quantity - modifiés UNIQUEMENT par
//     ReviewService::calc_average_ratings, jamais par le client
//   - start_lat / start_lng / start_address / start_description
//   - locations (JSON) - étapes du tour
//   - start_dates (JSON) - dates de départ
//   - secret_tour (BOOLEAN) - exclu des listings
//
// Points d'attention:
//   - Les guides sont dans la table de liaison tour_guides
//   - Les reviews sont une collection "virtuelle" (clé étrangère côté reviews)
//
// ============================================================================

use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Note par défaut quand un tour n'a aucune review
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[sea_orm(string_value = "easy")]
    Easy,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "difficult")]
    Difficult,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
    pub description: Option<String>,
    pub day: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Locations(pub Vec<Location>);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StartDates(pub Vec<DateTime<Utc>>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tours")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub start_dates: StartDates,
    pub secret_tour: bool,
    pub start_lat: f64,
    pub start_lng: f64,
    pub start_address: Option<String>,
    pub start_description: Option<String>,
    pub locations: Locations,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reviews::Entity")]
    Review,

    #[sea_orm(has_many = "super::tour_guides::Entity")]
    TourGuide,
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl Related<super::tour_guides::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TourGuide.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
