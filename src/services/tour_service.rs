use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::*;
use serde::Serialize;

use crate::error::AppError;
use crate::models::dto::{CreateTourRequest, UpdateTourRequest};
use crate::models::tours::{self, DEFAULT_RATINGS_AVERAGE, Locations, StartDates};
use crate::models::users::{self, Role};
use crate::models::{reviews, tour_guides};
use crate::services::repository::Repository;
use crate::services::review_service::{Author, ReviewWithAuthor};
use crate::utils::api_features::{ApiResource, QueryMap};
use crate::utils::geo::{self, Unit};
use crate::utils::slug::slugify;

impl ApiResource for tours::Entity {
    fn created_at() -> tours::Column {
        tours::Column::CreatedAt
    }
}

#[derive(Debug, Serialize)]
pub struct Guide {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
}

impl From<users::Model> for Guide {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            photo: user.photo,
            role: user.role,
        }
    }
}

/// GET /tours/:id : tour + guides + reviews (collection virtuelle)
#[derive(Debug, Serialize)]
pub struct TourDetail {
    #[serde(flatten)]
    pub tour: tours::Model,
    pub guides: Vec<Guide>,
    pub reviews: Vec<ReviewWithAuthor>,
}

#[derive(Debug, Serialize, FromQueryResult)]
pub struct DifficultyStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Serialize)]
pub struct MonthlyPlan {
    pub month: u32,
    pub num_tour_starts: usize,
    pub tours: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TourDistance {
    pub id: i32,
    pub name: String,
    pub distance: f64,
}

pub struct TourService;

impl TourService {
    /// Alias /top-5-best : query pré-remplie (écrase celle du client)
    pub fn top_tours_alias(mut query: QueryMap) -> QueryMap {
        query.insert("limit".to_string(), "5".to_string());
        query.insert("sort".to_string(), "-ratings_average,price".to_string());
        query.insert(
            "fields".to_string(),
            "name,price,ratings_average,summary,difficulty".to_string(),
        );
        query
    }

    /// Statistiques par difficulté des tours bien notés (>= 4.5)
    pub async fn stats(db: &DatabaseConnection) -> Result<Vec<DifficultyStats>, AppError> {
        Ok(TourRepository::base_query(None)
            .select_only()
            .column(tours::Column::Difficulty)
            .column_as(Expr::col(tours::Column::Id).count(), "num_tours")
            .column_as(Expr::col(tours::Column::RatingsQuantity).sum(), "num_ratings")
            .column_as(avg(tours::Column::RatingsAverage), "avg_rating")
            .column_as(avg(tours::Column::Price), "avg_price")
            .column_as(Expr::col(tours::Column::Price).min(), "min_price")
            .column_as(Expr::col(tours::Column::Price).max(), "max_price")
            .filter(tours::Column::RatingsAverage.gte(4.5))
            .group_by(tours::Column::Difficulty)
            .order_by_asc(Expr::cust("avg_price"))
            .into_model::<DifficultyStats>()
            .all(db)
            .await?)
    }

    /// Départs par mois pour une année, du mois le plus chargé au moins chargé
    pub async fn monthly_plan(db: &DatabaseConnection, year: i32) -> Result<Vec<MonthlyPlan>, AppError> {
        let tours = TourRepository::base_query(None).all(db).await?;

        let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for tour in tours {
            for date in tour.start_dates.0.iter().filter(|d| d.year() == year) {
                months.entry(date.month()).or_default().push(tour.name.clone());
            }
        }

        let mut plan: Vec<MonthlyPlan> = months
            .into_iter()
            .map(|(month, tours)| MonthlyPlan {
                month,
                num_tour_starts: tours.len(),
                tours,
            })
            .collect();

        // tri stable : à égalité, ordre des mois
        plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));
        plan.truncate(12);
        Ok(plan)
    }

    /// Tours dont le départ est dans un rayon `distance` autour de `latlng`
    pub async fn tours_within(
        db: &DatabaseConnection,
        distance: f64,
        latlng: &str,
        unit: &str,
    ) -> Result<Vec<tours::Model>, AppError> {
        let center = geo::parse_lat_lng(latlng)?;
        let unit = Unit::parse(unit)?;
        if !distance.is_finite() || distance < 0.0 {
            return Err(AppError::BadRequest("Distance must be a positive number".to_string()));
        }
        let radius = distance / unit.earth_radius();

        let tours = TourRepository::base_query(None).all(db).await?;
        Ok(tours
            .into_iter()
            .filter(|t| geo::central_angle(center, (t.start_lat, t.start_lng)) <= radius)
            .collect())
    }

    /// Distance de `latlng` au départ de chaque tour, du plus proche au plus loin
    pub async fn distances(
        db: &DatabaseConnection,
        latlng: &str,
        unit: &str,
    ) -> Result<Vec<TourDistance>, AppError> {
        let center = geo::parse_lat_lng(latlng)?;
        let unit = Unit::parse(unit)?;

        let mut distances: Vec<TourDistance> = TourRepository::base_query(None)
            .all(db)
            .await?
            .into_iter()
            .map(|t| TourDistance {
                distance: geo::distance(center, (t.start_lat, t.start_lng), unit),
                id: t.id,
                name: t.name,
            })
            .collect();

        distances.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(distances)
    }

    /// Vérifie que chaque id désigne un user actif de rôle guide / lead-guide
    async fn check_guides<C: ConnectionTrait>(db: &C, guides: &[i32]) -> Result<(), AppError> {
        let wanted: HashSet<i32> = guides.iter().copied().collect();
        if wanted.is_empty() {
            return Ok(());
        }

        let found = users::Entity::find()
            .filter(users::Column::Id.is_in(wanted.iter().copied()))
            .filter(users::Column::Active.eq(true))
            .filter(users::Column::Role.is_in([Role::Guide, Role::LeadGuide]))
            .count(db)
            .await?;

        if found as usize != wanted.len() {
            return Err(AppError::BadRequest(
                "Guides must be existing users with the guide or lead-guide role".to_string(),
            ));
        }
        Ok(())
    }

    async fn replace_guides<C: ConnectionTrait>(db: &C, tour_id: i32, guides: &[i32]) -> Result<(), AppError> {
        tour_guides::Entity::delete_many()
            .filter(tour_guides::Column::TourId.eq(tour_id))
            .exec(db)
            .await?;

        let unique: HashSet<i32> = guides.iter().copied().collect();
        if unique.is_empty() {
            return Ok(());
        }

        let links = unique.into_iter().map(|user_id| tour_guides::ActiveModel {
            tour_id: Set(tour_id),
            user_id: Set(user_id),
        });
        tour_guides::Entity::insert_many(links)
            .exec_without_returning(db)
            .await?;
        Ok(())
    }
}

fn avg(column: tours::Column) -> SimpleExpr {
    SimpleExpr::from(Func::avg(Expr::col(column)))
}

pub struct TourRepository;

#[async_trait]
impl Repository for TourRepository {
    type Entity = tours::Entity;
    type Model = tours::Model;
    type Detail = TourDetail;
    type Create = CreateTourRequest;
    type Update = UpdateTourRequest;

    const LABEL: &'static str = "tour";

    /// Les tours secrets n'apparaissent jamais dans les listings
    fn base_query(_parent: Option<i32>) -> Select<tours::Entity> {
        tours::Entity::find().filter(tours::Column::SecretTour.eq(false))
    }

    async fn find_one(db: &DatabaseConnection, id: i32) -> Result<Option<TourDetail>, AppError> {
        let Some(tour) = tours::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };

        let guide_ids: Vec<i32> = tour_guides::Entity::find()
            .select_only()
            .column(tour_guides::Column::UserId)
            .filter(tour_guides::Column::TourId.eq(id))
            .into_tuple()
            .all(db)
            .await?;

        let guides = users::Entity::find()
            .filter(users::Column::Id.is_in(guide_ids))
            .filter(users::Column::Active.eq(true))
            .order_by_asc(users::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Guide::from)
            .collect();

        let reviews = reviews::Entity::find()
            .filter(reviews::Column::TourId.eq(id))
            .find_also_related(users::Entity)
            .order_by_desc(reviews::Column::CreatedAt)
            .all(db)
            .await?
            .into_iter()
            .map(|(review, user)| ReviewWithAuthor {
                review,
                user: user.filter(|u| u.active).map(Author::from),
            })
            .collect();

        Ok(Some(TourDetail { tour, guides, reviews }))
    }

    async fn create(db: &DatabaseConnection, input: CreateTourRequest) -> Result<tours::Model, AppError> {
        let txn = db.begin().await?;
        TourService::check_guides(&txn, &input.guides).await?;

        let tour = tours::ActiveModel {
            slug: Set(slugify(&input.name)),
            name: Set(input.name),
            duration: Set(input.duration),
            max_group_size: Set(input.max_group_size),
            difficulty: Set(input.difficulty),
            ratings_average: Set(DEFAULT_RATINGS_AVERAGE),
            ratings_quantity: Set(0),
            price: Set(input.price),
            price_discount: Set(input.price_discount),
            summary: Set(input.summary.trim().to_string()),
            description: Set(input.description.map(|d| d.trim().to_string())),
            image_cover: Set(input.image_cover),
            start_dates: Set(StartDates(input.start_dates)),
            secret_tour: Set(input.secret_tour),
            start_lat: Set(input.start_location.lat),
            start_lng: Set(input.start_location.lng),
            start_address: Set(input.start_location.address),
            start_description: Set(input.start_location.description),
            locations: Set(Locations(input.locations)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        TourService::replace_guides(&txn, tour.id, &input.guides).await?;
        txn.commit().await?;
        Ok(tour)
    }

    async fn update(
        db: &DatabaseConnection,
        id: i32,
        input: UpdateTourRequest,
    ) -> Result<Option<tours::Model>, AppError> {
        let Some(existing) = tours::Entity::find_by_id(id).one(db).await? else {
            return Ok(None);
        };

        // la remise doit rester inférieure au prix après fusion
        let price = input.price.unwrap_or(existing.price);
        let discount = input.price_discount.unwrap_or(existing.price_discount);
        if discount.is_some_and(|d| d >= price) {
            return Err(AppError::Validation(
                "Discount price should be below regular price".to_string(),
            ));
        }

        let txn = db.begin().await?;
        let mut active: tours::ActiveModel = existing.clone().into();

        if let Some(name) = input.name {
            active.slug = Set(slugify(&name));
            active.name = Set(name);
        }
        if let Some(duration) = input.duration {
            active.duration = Set(duration);
        }
        if let Some(size) = input.max_group_size {
            active.max_group_size = Set(size);
        }
        if let Some(difficulty) = input.difficulty {
            active.difficulty = Set(difficulty);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(discount) = input.price_discount {
            active.price_discount = Set(discount);
        }
        if let Some(summary) = input.summary {
            active.summary = Set(summary.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description.trim().to_string()));
        }
        if let Some(cover) = input.image_cover {
            active.image_cover = Set(Some(cover));
        }
        if let Some(dates) = input.start_dates {
            active.start_dates = Set(StartDates(dates));
        }
        if let Some(secret) = input.secret_tour {
            active.secret_tour = Set(secret);
        }
        if let Some(start) = input.start_location {
            active.start_lat = Set(start.lat);
            active.start_lng = Set(start.lng);
            active.start_address = Set(start.address);
            active.start_description = Set(start.description);
        }
        if let Some(locations) = input.locations {
            active.locations = Set(Locations(locations));
        }

        let tour = if active.is_changed() {
            active.update(&txn).await?
        } else {
            existing
        };

        if let Some(guides) = input.guides {
            TourService::check_guides(&txn, &guides).await?;
            TourService::replace_guides(&txn, id, &guides).await?;
        }

        txn.commit().await?;
        Ok(Some(tour))
    }

    async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, AppError> {
        // reviews et liens guides suivent (ON DELETE CASCADE)
        let result = tours::Entity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }
}
