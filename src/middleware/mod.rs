pub mod auth;

pub use auth::{AuthUser, MaybeUser, Restricted};
