use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub preferences_path: PathBuf,
    pub auth_token: Option<String>,
    pub customer_id: Option<i64>,
    pub customer_age_verified: bool,
    pub status_port: Option<u16>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
            poll_interval: Duration::from_millis(parse_or_default("POLL_INTERVAL_MS", 5_000u64)?),
            request_timeout: Duration::from_millis(parse_or_default(
                "REQUEST_TIMEOUT_MS",
                4_000u64,
            )?),
            preferences_path: env::var("PREFERENCES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".order-tracker/preferences.json")),
            auth_token: env::var("AUTH_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            customer_id: parse_optional("CUSTOMER_ID")?,
            customer_age_verified: parse_or_default("CUSTOMER_AGE_VERIFIED", false)?,
            status_port: parse_optional("STATUS_PORT")?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Polls must not overlap in the common case, so every request has to
    /// give up before the next cycle is due.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval.is_zero() {
            return Err(AppError::Config("POLL_INTERVAL_MS must be > 0".to_string()));
        }

        if self.request_timeout.is_zero() || self.request_timeout >= self.poll_interval {
            return Err(AppError::Config(format!(
                "REQUEST_TIMEOUT_MS ({}) must be > 0 and shorter than POLL_INTERVAL_MS ({})",
                self.request_timeout.as_millis(),
                self.poll_interval.as_millis()
            )));
        }

        Ok(())
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_optional<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(None),
    }
}
