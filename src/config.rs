// ⚙️ Configuration - environment variables with `.env` support

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Runtime settings of the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,

    /// Address the API server listens on
    pub bind_addr: String,

    /// Base URL used to build links sent by mail
    pub site_url: String,

    /// Default page size of paginated lists
    pub paginate_by: usize,

    /// Days after creation during which an expenditure can be edited
    pub edit_delay_days: i64,

    /// Days a registration key stays valid
    pub registration_days: i64,

    /// Days a login session stays valid
    pub session_days: i64,

    /// Words of this length or shorter never become tags (0 keeps all)
    pub tag_min_len: usize,

    /// PBKDF2 rounds for new password hashes
    pub password_iterations: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: "purse.db".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            site_url: "http://localhost:3000".to_string(),
            paginate_by: 15,
            edit_delay_days: 2,
            registration_days: 30,
            session_days: 14,
            tag_min_len: 2,
            password_iterations: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from the environment (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            database_path: env::var("PURSE_DATABASE").unwrap_or(defaults.database_path),
            bind_addr: env::var("PURSE_BIND").unwrap_or(defaults.bind_addr),
            site_url: env::var("PURSE_SITE_URL").unwrap_or(defaults.site_url),
            paginate_by: parse_var("PURSE_PAGINATE_BY", defaults.paginate_by)?,
            edit_delay_days: parse_var("PURSE_EDIT_DELAY_DAYS", defaults.edit_delay_days)?,
            registration_days: parse_var("PURSE_REGISTRATION_DAYS", defaults.registration_days)?,
            session_days: parse_var("PURSE_SESSION_DAYS", defaults.session_days)?,
            tag_min_len: parse_var("PURSE_TAG_MIN_LEN", defaults.tag_min_len)?,
            password_iterations: parse_var(
                "PURSE_PASSWORD_ITERATIONS",
                defaults.password_iterations,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.paginate_by == 0 {
            return Err(ConfigError::ValidationError(
                "paginate_by must be positive".to_string(),
            ));
        }
        if self.edit_delay_days < 0 || self.registration_days < 0 {
            return Err(ConfigError::ValidationError(
                "delays cannot be negative".to_string(),
            ));
        }
        if self.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "session_days must be positive".to_string(),
            ));
        }
        if self.password_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "password_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for tests: fast password hashing, everything else default
    pub fn for_tests() -> Self {
        Config {
            database_path: ":memory:".to_string(),
            password_iterations: 10,
            ..Config::default()
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
