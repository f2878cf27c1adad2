pub mod auth_service;
pub mod email;
pub mod repository;
pub mod review_service;
pub mod tour_service;
pub mod user_service;
