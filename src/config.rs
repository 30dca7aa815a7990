use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub api_prefix: String,
    pub log_level: String,

    // Rate limiting
    pub rate_check_per_min: u32,
    pub rate_query_per_min: u32,

    // Attendance rules
    pub early_grace_minutes: i64,
    pub late_grace_minutes: i64,
    pub checkout_grace_minutes: i64,
    pub overtime_rounding_minutes: i64,
    pub default_shift_code: Option<String>,
    pub default_locale: String,

    // Caches and collaborators
    pub shift_cache_ttl_secs: u64,
    pub job_status_ttl_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),

            rate_check_per_min: var_or("RATE_CHECK_PER_MIN", 120)?,
            rate_query_per_min: var_or("RATE_QUERY_PER_MIN", 1000)?,

            early_grace_minutes: var_or("EARLY_GRACE_MINUTES", 60)?,
            late_grace_minutes: var_or("LATE_GRACE_MINUTES", 15)?,
            checkout_grace_minutes: var_or("CHECKOUT_GRACE_MINUTES", 120)?,
            overtime_rounding_minutes: var_or("OVERTIME_ROUNDING_MINUTES", 30)?,
            default_shift_code: env::var("DEFAULT_SHIFT_CODE").ok().filter(|s| !s.is_empty()),
            default_locale: env::var("DEFAULT_LOCALE").unwrap_or_else(|_| "en".to_string()),

            shift_cache_ttl_secs: var_or("SHIFT_CACHE_TTL_SECS", 300)?,
            job_status_ttl_secs: var_or("JOB_STATUS_TTL_SECS", 86_400)?,
            retry_max_attempts: var_or("RETRY_MAX_ATTEMPTS", 3)?,
            retry_base_delay_ms: var_or("RETRY_BASE_DELAY_MS", 100)?,
            retry_max_delay_ms: var_or("RETRY_MAX_DELAY_MS", 2000)?,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            early_grace: chrono::Duration::minutes(self.early_grace_minutes),
            late_grace: chrono::Duration::minutes(self.late_grace_minutes),
            checkout_grace: chrono::Duration::minutes(self.checkout_grace_minutes),
            overtime_rounding_minutes: self.overtime_rounding_minutes.max(1),
            shift_cache_ttl: Duration::from_secs(self.shift_cache_ttl_secs),
            default_locale: self.default_locale.clone(),
        }
    }
}

/// Rule parameters consumed by the engine components.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// How long before a window opens an employee may check in.
    pub early_grace: chrono::Duration,
    /// Check-ins after `start + late_grace` are late.
    pub late_grace: chrono::Duration,
    /// How long after a window closes a check-out is still accepted.
    pub checkout_grace: chrono::Duration,
    pub overtime_rounding_minutes: i64,
    pub shift_cache_ttl: Duration,
    pub default_locale: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            early_grace: chrono::Duration::minutes(60),
            late_grace: chrono::Duration::minutes(15),
            checkout_grace: chrono::Duration::minutes(120),
            overtime_rounding_minutes: 30,
            shift_cache_ttl: Duration::from_secs(300),
            default_locale: "en".to_string(),
        }
    }
}
