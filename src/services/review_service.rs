use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::*;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crate::error::AppError;
use crate::models::dto::{NewReview, UpdateReviewRequest};
use crate::models::tours::{self, DEFAULT_RATINGS_AVERAGE};
use crate::models::{reviews, users};
use crate::services::repository::Repository;
use crate::utils::api_features::ApiResource;

impl ApiResource for reviews::Entity {
    fn created_at() -> reviews::Column {
        reviews::Column::CreatedAt
    }

    /// L'auteur est toujours peuplé, même avec ?fields=
    fn always_selected() -> Vec<reviews::Column> {
        vec![reviews::Column::UserId]
    }
}

/// Auteur d'une review tel qu'affiché au client
#[derive(Debug, Serialize)]
pub struct Author {
    pub id: i32,
    pub name: String,
    pub photo: String,
}

impl From<users::Model> for Author {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            photo: user.photo,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: reviews::Model,
    pub user: Option<Author>,
}

pub struct ReviewService;

impl ReviewService {
    /// Recalcule ratings_quantity / ratings_average d'un tour à partir de ses
    /// reviews. Doit être appelé APRÈS l'écriture de la review.
    /// Sans review : retour aux valeurs par défaut (4.7 / 0).
    pub async fn calc_average_ratings<C: ConnectionTrait>(db: &C, tour_id: i32) -> Result<(), AppError> {
        let stats: Option<(i64, Option<f64>)> = reviews::Entity::find()
            .select_only()
            .column_as(Expr::col(reviews::Column::Id).count(), "n_rating")
            .column_as(
                SimpleExpr::from(Func::avg(Expr::col(reviews::Column::Rating))),
                "avg_rating",
            )
            .filter(reviews::Column::TourId.eq(tour_id))
            .into_tuple()
            .one(db)
            .await?;

        let (quantity, average) = match stats {
            Some((n, Some(avg))) if n > 0 => (i32::try_from(n).unwrap_or(i32::MAX), round_rating(avg)),
            _ => (0, DEFAULT_RATINGS_AVERAGE),
        };

        tours::Entity::update_many()
            .col_expr(tours::Column::RatingsQuantity, Expr::value(quantity))
            .col_expr(tours::Column::RatingsAverage, Expr::value(average))
            .filter(tours::Column::Id.eq(tour_id))
            .exec(db)
            .await?;

        debug!(tour_id, quantity, average, "tour ratings recomputed");
        Ok(())
    }

    /// Tours notés par un utilisateur : à capturer avant de supprimer ses reviews
    pub async fn tours_reviewed_by<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<i32>, AppError> {
        Ok(reviews::Entity::find()
            .select_only()
            .column(reviews::Column::TourId)
            .filter(reviews::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?)
    }
}

/// 4.666 -> 4.7
fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub struct ReviewRepository;

#[async_trait]
impl Repository for ReviewRepository {
    type Entity = reviews::Entity;
    type Model = reviews::Model;
    type Detail = ReviewWithAuthor;
    type Create = NewReview;
    type Update = UpdateReviewRequest;

    const LABEL: &'static str = "review";

    /// Reviews d'un tour si la route est imbriquée (/tours/:tour_id/reviews)
    fn base_query(parent: Option<i32>) -> Select<reviews::Entity> {
        match parent {
            Some(tour_id) => reviews::Entity::find().filter(reviews::Column::TourId.eq(tour_id)),
            None => reviews::Entity::find(),
        }
    }

    /// Ajoute "user": {id, name, photo} à chaque review listée
    async fn populate(db: &DatabaseConnection, mut rows: Vec<JsonValue>) -> Result<Vec<JsonValue>, AppError> {
        let user_ids: Vec<i32> = rows
            .iter()
            .filter_map(|row| row.get("user_id").and_then(JsonValue::as_i64))
            .filter_map(|id| i32::try_from(id).ok())
            .collect();

        let authors: HashMap<i32, users::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(user_ids))
                .filter(users::Column::Active.eq(true))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        for row in rows.iter_mut() {
            let author = row
                .get("user_id")
                .and_then(JsonValue::as_i64)
                .and_then(|id| i32::try_from(id).ok())
                .and_then(|id| authors.get(&id))
                .map(|u| json!({"id": u.id, "name": u.name, "photo": u.photo}));

            if let Some(object) = row.as_object_mut() {
                object.insert("user".to_string(), author.unwrap_or(JsonValue::Null));
            }
        }

        Ok(rows)
    }

    async fn find_one(db: &DatabaseConnection, id: i32) -> Result<Option<ReviewWithAuthor>, AppError> {
        let found = reviews::Entity::find_by_id(id)
            .find_also_related(users::Entity)
            .one(db)
            .await?;

        Ok(found.map(|(review, user)| ReviewWithAuthor {
            review,
            user: user.filter(|u| u.active).map(Author::from),
        }))
    }

    async fn create(db: &DatabaseConnection, input: NewReview) -> Result<reviews::Model, AppError> {
        if tours::Entity::find_by_id(input.tour_id).one(db).await?.is_none() {
            return Err(AppError::no_document("tour"));
        }

        let review = reviews::ActiveModel {
            review: Set(input.review),
            rating: Set(input.rating),
            created_at: Set(Utc::now()),
            tour_id: Set(input.tour_id),
            user_id: Set(input.user_id),
            ..Default::default()
        }
        .insert(db)
        .await?;

        ReviewService::calc_average_ratings(db, review.tour_id).await?;
        Ok(review)
    }

    async fn update(
        db: &DatabaseConnection,
        id: i32,
        input: UpdateReviewRequest,
    ) -> Result<Option<reviews::Model>, AppError> {
        let Some(existing) = reviews::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };
        // Capturé avant l'écriture
        let tour_id = existing.tour_id;

        let mut active: reviews::ActiveModel = existing.clone().into();
        if let Some(text) = input.review {
            active.review = Set(text);
        }
        if let Some(rating) = input.rating {
            active.rating = Set(rating);
        }

        if !active.is_changed() {
            return Ok(Some(existing));
        }

        let updated = active.update(db).await?;
        ReviewService::calc_average_ratings(db, tour_id).await?;
        Ok(Some(updated))
    }

    async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, AppError> {
        let Some(existing) = reviews::Entity::find_by_id(id).one(db).await? else {
            return Ok(false);
        };
        // La review n'existera plus après la suppression
        let tour_id = existing.tour_id;

        let result = reviews::Entity::delete_by_id(id).exec(db).await?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        ReviewService::calc_average_ratings(db, tour_id).await?;
        Ok(true)
    }
}
