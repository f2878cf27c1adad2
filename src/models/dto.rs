// Data Transfer Objects : payloads des requêtes + enveloppe de réponse
use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::models::tours::{Difficulty, Location};
use crate::models::users::Role;

// ----------------------------------------------------------------------------
// Enveloppe de réponse : {status, token?, results?, message?, data?}
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            token: None,
            results: None,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            token: None,
            results: None,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Données d'un document : {"data": ...}
#[derive(Debug, Serialize)]
pub struct DocData<T: Serialize> {
    pub data: T,
}

/// Données d'une réponse d'auth : {"user": ...}
#[derive(Debug, Serialize)]
pub struct UserData<T: Serialize> {
    pub user: T,
}

fn message_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

// ----------------------------------------------------------------------------
// AUTH
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub photo: Option<String>,
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
}

// ----------------------------------------------------------------------------
// USERS
// ----------------------------------------------------------------------------

/// PATCH /users/updateMe : seuls name/email/photo sont pris en compte.
/// password/password_confirm sont lus uniquement pour refuser la requête.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    pub password: Option<serde_json::Value>,
    pub password_confirm: Option<serde_json::Value>,
}

impl UpdateMeRequest {
    pub fn touches_password(&self) -> bool {
        self.password.is_some() || self.password_confirm.is_some()
    }
}

/// PATCH /users/:id (admin) : jamais de mot de passe ici
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "Please tell us your name!"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<Role>,
}

// ----------------------------------------------------------------------------
// TOURS
// ----------------------------------------------------------------------------

fn validate_coordinates(location: &Location) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&location.lat) && (-180.0..=180.0).contains(&location.lng) {
        Ok(())
    } else {
        Err(message_error("coordinates", "Coordinates are out of range"))
    }
}

fn validate_new_tour(tour: &CreateTourRequest) -> Result<(), ValidationError> {
    if let Some(discount) = tour.price_discount {
        if discount >= tour.price {
            return Err(message_error(
                "price_discount",
                "Discount price should be below regular price",
            ));
        }
    }
    std::iter::once(&tour.start_location)
        .chain(tour.locations.iter())
        .try_for_each(validate_coordinates)
}

fn validate_tour_update(tour: &UpdateTourRequest) -> Result<(), ValidationError> {
    if let (Some(Some(discount)), Some(price)) = (tour.price_discount, tour.price) {
        if discount >= price {
            return Err(message_error(
                "price_discount",
                "Discount price should be below regular price",
            ));
        }
    }
    tour.start_location
        .iter()
        .chain(tour.locations.iter().flatten())
        .try_for_each(validate_coordinates)
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_tour"))]
pub struct CreateTourRequest {
    #[validate(length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters"))]
    pub name: String,
    #[validate(range(min = 1, message = "A tour must have a duration"))]
    pub duration: i32,
    #[validate(range(min = 1, message = "A tour must have a group size"))]
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    #[validate(range(min = 0.0, message = "Price must be positive"))]
    pub price: f64,
    pub price_discount: Option<f64>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    pub start_location: Location,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub guides: Vec<i32>,
}

/// Distingue un champ absent (None) d'un `null` explicite (Some(None))
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_tour_update"))]
pub struct UpdateTourRequest {
    #[validate(length(min = 10, max = 40, message = "A tour name must have between 10 and 40 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "A tour must have a duration"))]
    pub duration: Option<i32>,
    #[validate(range(min = 1, message = "A tour must have a group size"))]
    pub max_group_size: Option<i32>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 0.0, message = "Price must be positive"))]
    pub price: Option<f64>,
    /// absent : inchangé, `null` : remise supprimée
    #[serde(default, deserialize_with = "nullable")]
    pub price_discount: Option<Option<f64>>,
    #[validate(length(min = 1, message = "A tour must have a summary"))]
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
    pub start_location: Option<Location>,
    pub locations: Option<Vec<Location>>,
    pub guides: Option<Vec<i32>>,
}

// ----------------------------------------------------------------------------
// REVIEWS
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub review: String,
    pub rating: Option<f64>,
    pub tour: Option<i32>,
}

/// Review prête à être persistée : tour et auteur déjà résolus
#[derive(Debug, Clone, Validate)]
pub struct NewReview {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: String,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: f64,
    pub tour_id: i32,
    pub user_id: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 1, message = "Review can not be empty!"))]
    pub review: Option<String>,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: Option<f64>,
}
