use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;
use tracing::info;

use crate::error::AppError;
use crate::models::dto::{SignupRequest, UpdateMeRequest, UpdateUserRequest};
use crate::models::users::{self, Role};
use crate::services::repository::Repository;
use crate::services::review_service::ReviewService;
use crate::utils::api_features::ApiResource;
use crate::utils::password;

pub const DEFAULT_PHOTO: &str = "default.jpg";

impl ApiResource for users::Entity {
    fn created_at() -> users::Column {
        users::Column::CreatedAt
    }

    fn is_hidden(column: &users::Column) -> bool {
        matches!(
            column,
            users::Column::Password
                | users::Column::PasswordChangedAt
                | users::Column::PasswordResetToken
                | users::Column::PasswordResetExpires
                | users::Column::Active
        )
    }
}

pub struct UserService;

impl UserService {
    pub async fn find_active_by_id<C: ConnectionTrait>(db: &C, id: i32) -> Result<Option<users::Model>, AppError> {
        Ok(UserRepository::base_query(None)
            .filter(users::Column::Id.eq(id))
            .one(db)
            .await?)
    }

    pub async fn find_active_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<users::Model>, AppError> {
        Ok(UserRepository::base_query(None)
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(db)
            .await?)
    }

    /// PATCH /users/updateMe : name / email / photo uniquement
    pub async fn update_me(
        db: &DatabaseConnection,
        user: users::Model,
        input: UpdateMeRequest,
    ) -> Result<users::Model, AppError> {
        if input.touches_password() {
            return Err(AppError::BadRequest(
                "This route is not for password updates. Please use /updateMyPassword.".to_string(),
            ));
        }

        let mut active: users::ActiveModel = user.clone().into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = input.email {
            active.email = Set(normalize_email(&email));
        }
        if let Some(photo) = input.photo {
            active.photo = Set(photo);
        }

        if !active.is_changed() {
            return Ok(user);
        }
        Ok(active.update(db).await?)
    }

    /// DELETE /users/deleteMe : soft delete, le compte devient invisible
    pub async fn deactivate(db: &DatabaseConnection, user_id: i32) -> Result<(), AppError> {
        users::Entity::update_many()
            .col_expr(users::Column::Active, sea_orm::sea_query::Expr::value(false))
            .filter(users::Column::Id.eq(user_id))
            .exec(db)
            .await?;

        info!(user_id, "account deactivated");
        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct UserRepository;

#[async_trait]
impl Repository for UserRepository {
    type Entity = users::Entity;
    type Model = users::Model;
    type Detail = users::Model;
    type Create = SignupRequest;
    type Update = UpdateUserRequest;

    const LABEL: &'static str = "user";

    /// Les comptes désactivés n'existent plus pour l'API
    fn base_query(_parent: Option<i32>) -> Select<users::Entity> {
        users::Entity::find().filter(users::Column::Active.eq(true))
    }

    async fn find_one(db: &DatabaseConnection, id: i32) -> Result<Option<users::Model>, AppError> {
        UserService::find_active_by_id(db, id).await
    }

    /// Inscription : le rôle est toujours "user", quel que soit le payload
    async fn create(db: &DatabaseConnection, input: SignupRequest) -> Result<users::Model, AppError> {
        let hash = password::hash_password_blocking(input.password).await?;

        let user = users::ActiveModel {
            name: Set(input.name.trim().to_string()),
            email: Set(normalize_email(&input.email)),
            photo: Set(input.photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string())),
            role: Set(Role::User),
            password: Set(hash),
            password_changed_at: Set(None),
            password_reset_token: Set(None),
            password_reset_expires: Set(None),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(user)
    }

    async fn update(
        db: &DatabaseConnection,
        id: i32,
        input: UpdateUserRequest,
    ) -> Result<Option<users::Model>, AppError> {
        let Some(existing) = UserService::find_active_by_id(db, id).await? else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = existing.clone().into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = input.email {
            active.email = Set(normalize_email(&email));
        }
        if let Some(photo) = input.photo {
            active.photo = Set(photo);
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }

        if !active.is_changed() {
            return Ok(Some(existing));
        }
        Ok(Some(active.update(db).await?))
    }

    /// Suppression définitive (admin). Les reviews partent en cascade :
    /// les notes des tours concernés sont recalculées ensuite.
    /// Un compte désactivé n'existe plus : 404 comme pour GET / PATCH.
    async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, AppError> {
        let txn = db.begin().await?;

        if UserService::find_active_by_id(&txn, id).await?.is_none() {
            txn.rollback().await?;
            return Ok(false);
        }

        let mut tour_ids = ReviewService::tours_reviewed_by(&txn, id).await?;
        tour_ids.sort_unstable();
        tour_ids.dedup();

        let result = users::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        for tour_id in tour_ids {
            ReviewService::calc_average_ratings(&txn, tour_id).await?;
        }

        txn.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::models::dto::NewReview;
    use crate::models::tours::{self, DEFAULT_RATINGS_AVERAGE};
    use crate::services::review_service::ReviewRepository;
    use crate::test_utils::{insert_tour, insert_user};

    fn signup(email: &str) -> SignupRequest {
        SignupRequest {
            name: "  Laura Wilson ".to_string(),
            email: email.to_string(),
            photo: None,
            password: "pass1234".to_string(),
            password_confirm: "pass1234".to_string(),
        }
    }

    #[actix_web::test]
    async fn test_create_normalizes_and_hashes() {
        let db = test_connection().await;
        let user = UserRepository::create(&db, signup("Laura@Example.COM")).await.unwrap();

        assert_eq!(user.name, "Laura Wilson");
        assert_eq!(user.email, "laura@example.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.photo, DEFAULT_PHOTO);
        assert_ne!(user.password, "pass1234");
        assert!(password::verify_password("pass1234", &user.password).unwrap());
    }

    #[actix_web::test]
    async fn test_duplicate_email_is_translated() {
        let db = test_connection().await;
        UserRepository::create(&db, signup("same@example.com")).await.unwrap();
        let err = UserRepository::create(&db, signup("SAME@example.com")).await.unwrap_err();

        assert!(matches!(err.translate(), Some(AppError::Duplicate(_))));
    }

    #[actix_web::test]
    async fn test_deactivated_user_is_invisible() {
        let db = test_connection().await;
        let user = insert_user(&db, "leaving@example.com", Role::User).await;

        UserService::deactivate(&db, user.id).await.unwrap();

        assert!(UserRepository::find_one(&db, user.id).await.unwrap().is_none());
        assert!(UserService::find_active_by_email(&db, "leaving@example.com").await.unwrap().is_none());
        assert!(UserRepository::base_query(None).all(&db).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_update_me_rejects_password() {
        let db = test_connection().await;
        let user = insert_user(&db, "me@example.com", Role::User).await;

        let input: UpdateMeRequest =
            serde_json::from_value(serde_json::json!({"password": "newpass123"})).unwrap();
        let err = UserService::update_me(&db, user.clone(), input).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let input: UpdateMeRequest =
            serde_json::from_value(serde_json::json!({"name": "New Name", "role": "admin"})).unwrap();
        let updated = UserService::update_me(&db, user, input).await.unwrap();
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.role, Role::User);
    }

    #[actix_web::test]
    async fn test_hard_delete_recomputes_ratings() {
        let db = test_connection().await;
        let tour = insert_tour(&db, "The Desert Crossing", 899.0).await;
        let kept = insert_user(&db, "kept@example.com", Role::User).await;
        let removed = insert_user(&db, "removed@example.com", Role::User).await;

        for (user_id, rating) in [(kept.id, 4.0), (removed.id, 1.0)] {
            let review = NewReview {
                review: "Nice".to_string(),
                rating,
                tour_id: tour.id,
                user_id,
            };
            ReviewRepository::create(&db, review).await.unwrap();
        }

        assert!(UserRepository::delete(&db, removed.id).await.unwrap());
        let tour = tours::Entity::find_by_id(tour.id).one(&db).await.unwrap().unwrap();
        assert_eq!((tour.ratings_average, tour.ratings_quantity), (4.0, 1));

        assert!(UserRepository::delete(&db, kept.id).await.unwrap());
        let tour = tours::Entity::find_by_id(tour.id).one(&db).await.unwrap().unwrap();
        assert_eq!(tour.ratings_average, DEFAULT_RATINGS_AVERAGE);

        assert!(!UserRepository::delete(&db, 4242).await.unwrap());
    }

    #[actix_web::test]
    async fn test_hard_delete_ignores_deactivated_user() {
        let db = test_connection().await;
        let user = insert_user(&db, "gone@example.com", Role::User).await;
        UserService::deactivate(&db, user.id).await.unwrap();

        assert!(!UserRepository::delete(&db, user.id).await.unwrap());
        // la ligne est toujours là, seulement inactive
        let row = users::Entity::find_by_id(user.id).one(&db).await.unwrap().unwrap();
        assert!(!row.active);
    }
}
