pub mod api_features;
pub mod geo;
pub mod jwt;
pub mod password;
pub mod reset_token;
pub mod slug;
