use std::env;
use std::fmt::Display;
use std::str::FromStr;

use log::{info, warn};
use thiserror::Error;

const MIDTRANS_SANDBOX_URL: &str = "https://api.sandbox.midtrans.com";
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;
// Cost range accepted by bcrypt
const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime configuration, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub midtrans_server_key: String,
    pub midtrans_base_url: String,
    /// GoPay deep-link callback; omitted from charges when unset
    pub payment_callback_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let midtrans_server_key = var("MIDTRANS_SERVER_KEY").unwrap_or_else(|| {
            warn!("MIDTRANS_SERVER_KEY not set, gateway calls will be rejected");
            String::new()
        });

        Self {
            host: try_load("HOST", "127.0.0.1")?,
            port: try_load("PORT", "8080")?,
            database_path: try_load("DATABASE_PATH", "rental_desk.db")?,
            jwt_secret: var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "72")?,
            bcrypt_cost: try_load("BCRYPT_COST", "12")?,
            midtrans_server_key,
            midtrans_base_url: try_load("MIDTRANS_BASE_URL", MIDTRANS_SANDBOX_URL)?,
            payment_callback_url: var("PAYMENT_CALLBACK_URL"),
        }
        .validate()
    }

    /// Reject values that parse but are out of range
    fn validate(self) -> Result<Self, ConfigError> {
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                reason: format!("must be between 1 and {}", MAX_TOKEN_TTL_HOURS),
            });
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: format!("must be between {} and {}", MIN_BCRYPT_COST, MAX_BCRYPT_COST),
            });
        }
        Ok(self)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
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

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_path: ":memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        token_ttl_hours: 72,
        bcrypt_cost: 4,
        midtrans_server_key: "SB-Mid-server-test".to_string(),
        midtrans_base_url: MIDTRANS_SANDBOX_URL.to_string(),
        payment_callback_url: Some("https://example.test/webhook/payment".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test defaults and parse failures of try_load
    #[test]
    fn test_try_load() {
        let port: u16 = try_load("RENTAL_DESK_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(port, 8080);

        let bad: Result<u16, _> = try_load("RENTAL_DESK_TEST_UNSET_BAD", "not-a-port");
        assert!(matches!(bad, Err(ConfigError::Invalid { .. })));
    }

    // Test out-of-range durations and costs are refused before they reach the token or hash code
    #[test]
    fn test_validate_ranges() {
        assert!(test_config().validate().is_ok());

        for ttl in [0, -1, MAX_TOKEN_TTL_HOURS + 1, i64::MAX] {
            let config = Config { token_ttl_hours: ttl, ..test_config() };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Invalid { key: "TOKEN_TTL_HOURS", .. })
            ));
        }

        let config = Config { bcrypt_cost: 40, ..test_config() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "BCRYPT_COST", .. })
        ));
    }
}
