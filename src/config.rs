use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

/// Mode d'exécution : pilote la verbosité des erreurs et le flag `secure` du cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub jwt_cookie_expires_in_days: i64,
    pub reset_token_ttl: Duration,
    pub session_bind_ip: bool,
}

impl Config {
    /// Charge la configuration depuis `.env` puis les variables d'environnement
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Ok(Self {
            environment: try_load("APP_ENV", "production")?,
            host: try_load("HOST", "127.0.0.1")?,
            port: try_load("PORT", "3000")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expires_in: load_duration("JWT_EXPIRES_IN", "90d")?,
            jwt_cookie_expires_in_days: try_load("JWT_COOKIE_EXPIRES_IN", "90")?,
            reset_token_ttl: load_duration("RESET_TOKEN_TTL", "10m")?,
            session_bind_ip: try_load("SESSION_BIND_IP", "false")?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    var(key).ok_or_else(|| {
        warn!("Environment variable {key} not found");
        ConfigError::Missing(key)
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn load_duration(key: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let raw = var(key).unwrap_or_else(|| default.to_string());
    humantime::parse_duration(&raw).map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            environment: Environment::Development,
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-do-not-use".to_string(),
            jwt_expires_in: Duration::from_secs(90 * 24 * 3600),
            jwt_cookie_expires_in_days: 90,
            reset_token_ttl: Duration::from_secs(600),
            session_bind_ip: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("development".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_humantime_defaults() {
        assert_eq!(humantime::parse_duration("90d").unwrap(), Duration::from_secs(90 * 86_400));
        assert_eq!(humantime::parse_duration("10m").unwrap(), Duration::from_secs(600));
    }
}
