// Fixtures partagées par les tests (compilé uniquement sous cfg(test))

use std::sync::{Arc, Mutex};

use actix_web::web;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::config::Config;
use crate::models::dto::CreateTourRequest;
use crate::models::tours::{self, DEFAULT_RATINGS_AVERAGE, Difficulty, Location, Locations, StartDates};
use crate::models::users::{self, Role};
use crate::services::auth_service::AuthService;
use crate::services::email::{Email, MailError, Mailer};
use crate::utils::{password, slug::slugify};

pub const PASSWORD: &str = "pass1234";

pub async fn insert_tour(db: &DatabaseConnection, name: &str, price: f64) -> tours::Model {
    tours::ActiveModel {
        name: Set(name.to_string()),
        slug: Set(slugify(name)),
        duration: Set(5),
        max_group_size: Set(10),
        difficulty: Set(Difficulty::Easy),
        ratings_average: Set(DEFAULT_RATINGS_AVERAGE),
        ratings_quantity: Set(0),
        price: Set(price),
        price_discount: Set(None),
        summary: Set("A test tour".to_string()),
        description: Set(None),
        image_cover: Set(None),
        start_dates: Set(StartDates::default()),
        secret_tour: Set(false),
        start_lat: Set(51.417),
        start_lng: Set(-116.214),
        start_address: Set(None),
        start_description: Set(None),
        locations: Set(Locations::default()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert tour")
}

/// Utilisateur actif, mot de passe PASSWORD
pub async fn insert_user(db: &DatabaseConnection, email: &str, role: Role) -> users::Model {
    users::ActiveModel {
        name: Set(email.split('@').next().unwrap_or(email).to_string()),
        email: Set(email.to_string()),
        photo: Set("default.jpg".to_string()),
        role: Set(role),
        password: Set(password::hash_password(PASSWORD).expect("hash")),
        password_changed_at: Set(None),
        password_reset_token: Set(None),
        password_reset_expires: Set(None),
        active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user")
}

pub fn tour_request(name: &str, price: f64) -> CreateTourRequest {
    CreateTourRequest {
        name: name.to_string(),
        duration: 7,
        max_group_size: 15,
        difficulty: Difficulty::Medium,
        price,
        price_discount: None,
        summary: "Exploring the jaw-dropping US east coast".to_string(),
        description: None,
        image_cover: None,
        start_dates: vec![],
        secret_tour: false,
        start_location: Location {
            lat: 25.774,
            lng: -80.185,
            address: Some("301 Biscayne Blvd, Miami, FL 33132, USA".to_string()),
            description: Some("Miami, USA".to_string()),
            day: None,
        },
        locations: vec![],
        guides: vec![],
    }
}

pub fn bearer(config: &Config, user: &users::Model) -> (&'static str, String) {
    let token = AuthService::issue_token(config, user.id, None).expect("token");
    ("Authorization", format!("Bearer {token}"))
}

/// web::Data partagées par les tests HTTP
pub struct TestState {
    pub db: web::Data<DatabaseConnection>,
    pub config: web::Data<Config>,
    pub mailer: web::Data<dyn Mailer>,
    pub outbox: Arc<RecordingMailer>,
}

pub fn test_state(db: DatabaseConnection) -> TestState {
    let outbox = Arc::new(RecordingMailer::default());
    let mailer: Arc<dyn Mailer> = outbox.clone();
    TestState {
        db: web::Data::new(db),
        config: web::Data::new(Config::for_tests()),
        mailer: web::Data::from(mailer),
        outbox,
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent.lock().expect("mailer lock").push(email);
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: Email) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".to_string()))
    }
}
