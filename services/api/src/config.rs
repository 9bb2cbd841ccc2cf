//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use quillwright_core::DailyLimits;
use secrecy::SecretString;
use tracing::Level;

/// JWT secrets shorter than this are rejected at startup.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// SMTP settings. Absent when `SMTP_HOST` is not set, which disables mail.
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub jwt_secret: SecretString,
    pub jwt_expires_days: i64,
    pub openai_api_key: Option<SecretString>,
    pub ai_model: String,
    pub ai_limits: DailyLimits,
    pub cors_origin: String,
    pub upload_dir: PathBuf,
    pub public_url: String,
    pub mail: Option<MailConfig>,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Load Server and Database Settings ---
        let bind_address = parse("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:5000"))?;
        let database_url = required("DATABASE_URL")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Auth Settings ---
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            ));
        }
        let jwt_expires_days: i64 = parse("JWT_EXPIRES_DAYS", &var_or("JWT_EXPIRES_DAYS", "7"))?;
        if jwt_expires_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "JWT_EXPIRES_DAYS".to_string(),
                "must be positive".to_string(),
            ));
        }

        // --- Load AI Settings (the API key is optional) ---
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.is_empty())
            .map(SecretString::from);
        let ai_model = var_or("AI_MODEL", "gpt-4o-mini");
        let ai_limits = DailyLimits {
            free: parse("AI_DAILY_LIMIT_FREE", &var_or("AI_DAILY_LIMIT_FREE", "50"))?,
            premium: parse("AI_DAILY_LIMIT_PREMIUM", &var_or("AI_DAILY_LIMIT_PREMIUM", "500"))?,
        };

        // --- Load Web Settings ---
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");
        let upload_dir = PathBuf::from(var_or("UPLOAD_DIR", "./uploads"));
        let public_url = var_or("PUBLIC_URL", "http://localhost:3000");
        let rate_limit_per_minute: u32 =
            parse("RATE_LIMIT_PER_MINUTE", &var_or("RATE_LIMIT_PER_MINUTE", "100"))?;
        if rate_limit_per_minute == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_PER_MINUTE".to_string(),
                "must be positive".to_string(),
            ));
        }

        // --- Load Mail Settings ---
        let mail = match lookup("SMTP_HOST").filter(|h| !h.is_empty()) {
            Some(smtp_host) => Some(MailConfig {
                smtp_host,
                smtp_port: parse("SMTP_PORT", &var_or("SMTP_PORT", "587"))?,
                smtp_username: var_or("SMTP_USERNAME", ""),
                smtp_password: SecretString::from(var_or("SMTP_PASSWORD", "")),
                from_address: required("MAIL_FROM")?,
            }),
            None => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            jwt_secret: SecretString::from(jwt_secret),
            jwt_expires_days,
            openai_api_key,
            ai_model,
            ai_limits,
            cors_origin,
            upload_dir,
            public_url,
            mail,
            rate_limit_per_minute,
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
