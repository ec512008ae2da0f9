//! Runtime configuration
//!
//! Read from the environment (after loading `.env`). Absent values fall back
//! to defaults; present but malformed values are configuration errors.

use crate::classifier::DEFAULT_MIN_CONFIDENCE;
use crate::confirmation::{DEFAULT_CONFIRMATION_WINDOW_SECS, MAX_CONFIRMATION_WINDOW_SECS};
use crate::error::EngineError;
use crate::memory::resolver::DEFAULT_NAME_MATCH_TOLERANCE;
use crate::models::Kobo;
use crate::state::DEFAULT_HISTORY_WINDOW;
use crate::verification::{DEFAULT_DAILY_TRANSFER_LIMIT, DEFAULT_SINGLE_TRANSFER_LIMIT};
use crate::Result;
use chrono::Duration;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 8080;

/// Values shipped in example env files; treated as unset
const PLACEHOLDER_KEYS: &[&str] = &["sk_test_placeholder", "sk_test_your_secret_key_here"];

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub paystack_secret_key: Option<String>,
    pub paystack_base_url: Option<String>,
    pub database_url: Option<String>,
    pub confirmation_window: Duration,
    pub history_window: usize,
    pub name_match_tolerance: usize,
    pub min_confidence: f32,
    pub single_transfer_limit: Kobo,
    pub daily_transfer_limit: Kobo,
    pub port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            paystack_secret_key: None,
            paystack_base_url: None,
            database_url: None,
            confirmation_window: Duration::seconds(DEFAULT_CONFIRMATION_WINDOW_SECS),
            history_window: DEFAULT_HISTORY_WINDOW,
            name_match_tolerance: DEFAULT_NAME_MATCH_TOLERANCE,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            single_transfer_limit: DEFAULT_SINGLE_TRANSFER_LIMIT,
            daily_transfer_limit: DEFAULT_DAILY_TRANSFER_LIMIT,
            port: DEFAULT_PORT,
        }
    }
}

impl AgentConfig {
    /// Load `.env`, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let window_secs: i64 = parse_or(&get, "CONFIRMATION_WINDOW_SECS", DEFAULT_CONFIRMATION_WINDOW_SECS)?;
        if window_secs <= 0 {
            return Err(EngineError::ConfigError(
                "CONFIRMATION_WINDOW_SECS must be positive".to_string(),
            ));
        }
        if window_secs > MAX_CONFIRMATION_WINDOW_SECS {
            return Err(EngineError::ConfigError(format!(
                "CONFIRMATION_WINDOW_SECS must be at most {}",
                MAX_CONFIRMATION_WINDOW_SECS
            )));
        }

        let min_confidence: f32 = parse_or(&get, "MIN_CONFIDENCE", defaults.min_confidence)?;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(EngineError::ConfigError(
                "MIN_CONFIDENCE must be between 0 and 1".to_string(),
            ));
        }

        let single_limit = naira_limit(&get, "SINGLE_TRANSFER_LIMIT_NAIRA", defaults.single_transfer_limit)?;
        let daily_limit = naira_limit(&get, "DAILY_TRANSFER_LIMIT_NAIRA", defaults.daily_transfer_limit)?;

        let port = match get("API_PORT").or_else(|| get("PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| EngineError::ConfigError(format!("Invalid port: {}", raw)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            paystack_secret_key: get("PAYSTACK_SECRET_KEY")
                .filter(|key| !PLACEHOLDER_KEYS.contains(&key.as_str())),
            paystack_base_url: get("PAYSTACK_BASE_URL"),
            database_url: get("DATABASE_URL").or_else(|| get("POSTGRES_URL")),
            confirmation_window: Duration::seconds(window_secs),
            history_window: parse_or(&get, "HISTORY_WINDOW", defaults.history_window)?.max(1),
            name_match_tolerance: parse_or(&get, "NAME_MATCH_TOLERANCE", defaults.name_match_tolerance)?,
            min_confidence,
            single_transfer_limit: single_limit,
            daily_transfer_limit: daily_limit,
            port,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| EngineError::ConfigError(format!("Invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}

fn naira_limit<G>(get: &G, key: &str, default: Kobo) -> Result<Kobo>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(_) => {
            let naira: i64 = parse_or(get, key, 0)?;
            if naira <= 0 {
                return Err(EngineError::ConfigError(format!("{} must be positive", key)));
            }
            Ok(Kobo::from_naira(naira))
        }
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AgentConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.confirmation_window, Duration::minutes(5));
        assert_eq!(cfg.history_window, 20);
        assert_eq!(cfg.name_match_tolerance, 1);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(cfg.paystack_secret_key.is_none());
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("CONFIRMATION_WINDOW_SECS", "60"),
            ("NAME_MATCH_TOLERANCE", "2"),
            ("SINGLE_TRANSFER_LIMIT_NAIRA", "50000"),
            ("POSTGRES_URL", "postgres://localhost/bank"),
            ("PORT", "9000"),
            ("PAYSTACK_SECRET_KEY", "sk_test_real"),
        ])
        .unwrap();

        assert_eq!(cfg.confirmation_window, Duration::seconds(60));
        assert_eq!(cfg.name_match_tolerance, 2);
        assert_eq!(cfg.single_transfer_limit, Kobo::from_naira(50_000));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/bank"));
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.paystack_secret_key.as_deref(), Some("sk_test_real"));
    }

    #[test]
    fn test_placeholder_key_is_unset() {
        let cfg = config(&[("PAYSTACK_SECRET_KEY", "sk_test_placeholder")]).unwrap();
        assert!(cfg.paystack_secret_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(config(&[("CONFIRMATION_WINDOW_SECS", "soon")]).is_err());
        assert!(config(&[("CONFIRMATION_WINDOW_SECS", "0")]).is_err());
        assert!(config(&[("CONFIRMATION_WINDOW_SECS", "86401")]).is_err());
        assert!(config(&[("CONFIRMATION_WINDOW_SECS", "9223372036854775807")]).is_err());
        assert!(config(&[("CONFIRMATION_WINDOW_SECS", "86400")]).is_ok());
        assert!(config(&[("MIN_CONFIDENCE", "1.5")]).is_err());
        assert!(config(&[("SINGLE_TRANSFER_LIMIT_NAIRA", "-5")]).is_err());
        assert!(config(&[("PORT", "http")]).is_err());
    }
}
