use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub request_timeout: Duration,
    pub cancel_check_every: usize,
    pub event_buffer_size: usize,
    /// SQLite connection string. The in-memory store is used when unset.
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let cancel_check_every: usize = parse_or_default("CANCEL_CHECK_EVERY", 1000)?;
        if cancel_check_every == 0 {
            return Err(AppError::Validation(
                "CANCEL_CHECK_EVERY must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            request_timeout: Duration::from_millis(parse_or_default("REQUEST_TIMEOUT_MS", 5000)?),
            cancel_check_every,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            request_timeout: Duration::from_secs(5),
            cancel_check_every: 1000,
            event_buffer_size: 1024,
            database_url: None,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Validation(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
