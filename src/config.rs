//! Server configuration.
//!
//! Everything is read from environment variables. Secrets and the database
//! URL are redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 365;
pub const DEFAULT_MAX_ROOM_CAPACITY: i32 = 50;
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 100;
pub const DEFAULT_TELEPHONY_PORT: u16 = 8021;

const DEV_JWT_SECRET: &str = "your-secret-key-change-in-production";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("TELEPHONY_PASSWORD must be set when TELEPHONY_HOST is set")]
    MissingTelephonyPassword,
}

/// Connection settings for the external conferencing daemon
#[derive(Clone)]
pub struct TelephonyConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl fmt::Debug for TelephonyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelephonyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    pub bind_address: String,

    /// PostgreSQL connection URL. In-memory stores are used when absent.
    pub database_url: Option<String>,

    pub jwt_secret: String,

    pub session_expiration_days: i64,

    /// Upper bound on the capacity a room creator may ask for.
    pub max_room_capacity: i32,

    /// Buffered events per room channel before slow subscribers start lagging.
    pub event_channel_capacity: usize,

    /// Conferencing daemon. Telephony is disabled when absent.
    pub telephony: Option<TelephonyConfig>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_address", &self.bind_address)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jwt_secret", &"[REDACTED]")
            .field("session_expiration_days", &self.session_expiration_days)
            .field("max_room_capacity", &self.max_room_capacity)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .field("telephony", &self.telephony)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            database_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
            max_room_capacity: DEFAULT_MAX_ROOM_CAPACITY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            telephony: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map of variables (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or(defaults.bind_address);

        let database_url = vars
            .get("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .cloned();

        let jwt_secret = vars
            .get("JWT_SECRET")
            .cloned()
            .unwrap_or(defaults.jwt_secret);

        let session_expiration_days = parse_var(
            vars,
            "SESSION_EXPIRATION_DAYS",
            defaults.session_expiration_days,
        )?;

        let max_room_capacity = parse_var(vars, "MAX_ROOM_CAPACITY", defaults.max_room_capacity)?;
        if max_room_capacity < 1 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_ROOM_CAPACITY",
                value: max_room_capacity.to_string(),
            });
        }

        let event_channel_capacity = parse_var(
            vars,
            "EVENT_CHANNEL_CAPACITY",
            defaults.event_channel_capacity,
        )?;
        if event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                name: "EVENT_CHANNEL_CAPACITY",
                value: "0".to_string(),
            });
        }

        let telephony = match vars.get("TELEPHONY_HOST").filter(|h| !h.trim().is_empty()) {
            Some(host) => Some(TelephonyConfig {
                host: host.clone(),
                port: parse_var(vars, "TELEPHONY_PORT", DEFAULT_TELEPHONY_PORT)?,
                password: vars
                    .get("TELEPHONY_PASSWORD")
                    .cloned()
                    .ok_or(ConfigError::MissingTelephonyPassword)?,
            }),
            None => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            jwt_secret,
            session_expiration_days,
            max_room_capacity,
            event_channel_capacity,
            telephony,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw.clone(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = AppConfig::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert!(config.database_url.is_none());
        assert_eq!(config.session_expiration_days, 365);
        assert_eq!(config.max_room_capacity, 50);
        assert_eq!(config.event_channel_capacity, 100);
        assert!(config.telephony.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = AppConfig::from_vars(&vars(&[
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("DATABASE_URL", "postgres://localhost/rooms"),
            ("MAX_ROOM_CAPACITY", "12"),
            ("TELEPHONY_HOST", "10.0.0.5"),
            ("TELEPHONY_PASSWORD", "ClueCon"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/rooms")
        );
        assert_eq!(config.max_room_capacity, 12);

        let telephony = config.telephony.unwrap();
        assert_eq!(telephony.host, "10.0.0.5");
        assert_eq!(telephony.port, DEFAULT_TELEPHONY_PORT);
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let result = AppConfig::from_vars(&vars(&[("MAX_ROOM_CAPACITY", "lots")]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::InvalidValue {
                name: "MAX_ROOM_CAPACITY",
                value: "lots".to_string()
            }
        );

        let result = AppConfig::from_vars(&vars(&[("MAX_ROOM_CAPACITY", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_telephony_host_requires_password() {
        let result = AppConfig::from_vars(&vars(&[("TELEPHONY_HOST", "10.0.0.5")]));
        assert_eq!(result.unwrap_err(), ConfigError::MissingTelephonyPassword);
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = AppConfig::from_vars(&vars(&[
            ("DATABASE_URL", "postgres://user:hunter2@db/rooms"),
            ("JWT_SECRET", "super-secret"),
        ]))
        .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
