//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use learning_progress_core::GamificationRules;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub db_max_connections: u32,
    pub cors_origin: String,
    /// Upper bound for the `limit` of an activity feed request.
    pub activity_feed_max: usize,
    pub rules: GamificationRules,
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

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?;
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let activity_feed_max = parse_or(&lookup, "ACTIVITY_FEED_MAX", 100)?;

        // --- Load Gamification Rules ---
        let defaults = GamificationRules::default();
        let rules = GamificationRules {
            lesson_completion_xp: parse_or(&lookup, "LESSON_COMPLETION_XP", defaults.lesson_completion_xp)?,
            xp_per_correct_answer: parse_or(&lookup, "XP_PER_CORRECT_ANSWER", defaults.xp_per_correct_answer)?,
            pass_threshold_percent: parse_or(&lookup, "QUIZ_PASS_THRESHOLD", defaults.pass_threshold_percent)?,
            streak_milestone_interval: parse_or(
                &lookup,
                "STREAK_MILESTONE_INTERVAL",
                defaults.streak_milestone_interval,
            )?,
            streak_bonus_per_day: parse_or(&lookup, "STREAK_BONUS_PER_DAY", defaults.streak_bonus_per_day)?,
            generic_xp_activity_min: parse_or(
                &lookup,
                "GENERIC_XP_ACTIVITY_MIN",
                defaults.generic_xp_activity_min,
            )?,
            general_quiz_size: parse_or(&lookup, "GENERAL_QUIZ_SIZE", defaults.general_quiz_size)?,
        };
        rules
            .validate()
            .map_err(|e| ConfigError::InvalidValue("gamification rules".to_string(), e.to_string()))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            db_max_connections,
            cors_origin,
            activity_feed_max,
            rules,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/progress")]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.activity_feed_max, 100);
        assert_eq!(config.rules, GamificationRules::default());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(var)) if var == "DATABASE_URL"));
    }

    #[test]
    fn rule_overrides_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/progress"),
            ("QUIZ_PASS_THRESHOLD", "80"),
            ("XP_PER_CORRECT_ANSWER", "15"),
            ("GENERAL_QUIZ_SIZE", "10"),
        ])
        .unwrap();
        assert_eq!(config.rules.pass_threshold_percent, 80);
        assert_eq!(config.rules.xp_per_correct_answer, 15);
        assert_eq!(config.rules.general_quiz_size, 10);
        assert_eq!(config.rules.lesson_completion_xp, 25);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/progress"),
            ("STREAK_BONUS_PER_DAY", "lots"),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidValue(var, _)) if var == "STREAK_BONUS_PER_DAY"));

        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/progress"),
            ("QUIZ_PASS_THRESHOLD", "150"),
        ]);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_, _))));

        let result = load(&[("DATABASE_URL", "x"), ("RUST_LOG", "chatty")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue(var, _)) if var == "RUST_LOG"));
    }
}
