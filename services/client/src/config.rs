//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The language readings are requested in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Locale {
    En,
    Zh,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "zh" => Ok(Locale::Zh),
            other => Err(format!("'{}' is not a supported locale (en, zh)", other)),
        }
    }
}

/// How the reading flow schedules its remote calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowMode {
    /// Draw when asked, interpret once every card is revealed.
    Sequential,
    /// Draw and interpret in the background as soon as the question is accepted.
    Prefetch,
}

impl FromStr for FlowMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(FlowMode::Sequential),
            "prefetch" => Ok(FlowMode::Prefetch),
            other => Err(format!("'{}' is not a reading mode (sequential, prefetch)", other)),
        }
    }
}

/// What the HTTP adapter does when the service answers 401.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnauthorizedPolicy {
    /// Log and pass the error through.
    Ignore,
    /// Clear the user session, then pass the error through.
    Logout,
}

impl FromStr for UnauthorizedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(UnauthorizedPolicy::Ignore),
            "logout" => Ok(UnauthorizedPolicy::Logout),
            other => Err(format!("'{}' is not a policy (ignore, logout)", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub storage_dir: PathBuf,
    pub language: Locale,
    pub log_level: Level,
    pub shuffle_delay: Duration,
    pub flow_mode: FlowMode,
    pub unauthorized_policy: UnauthorizedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            storage_dir: PathBuf::from("./.tarot"),
            language: Locale::En,
            log_level: Level::INFO,
            shuffle_delay: Duration::from_millis(3000),
            flow_mode: FlowMode::Sequential,
            unauthorized_policy: UnauthorizedPolicy::Ignore,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to keep tests hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = lookup("TAROT_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "TAROT_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let storage_dir = lookup("TAROT_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);

        let language = parse_or("TAROT_LANGUAGE", &lookup, defaults.language)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let shuffle_delay = match lookup("SHUFFLE_DELAY_MS") {
            Some(ms) => Duration::from_millis(ms.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("SHUFFLE_DELAY_MS".to_string(), e.to_string())
            })?),
            None => defaults.shuffle_delay,
        };

        let flow_mode = parse_or("READING_MODE", &lookup, defaults.flow_mode)?;
        let unauthorized_policy =
            parse_or("ON_UNAUTHORIZED", &lookup, defaults.unauthorized_policy)?;

        Ok(Self {
            api_base_url,
            storage_dir,
            language,
            log_level,
            shuffle_delay,
            flow_mode,
            unauthorized_policy,
        })
    }
}

fn parse_or<T>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr<Err = String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000/api/v1");
        assert_eq!(config.language, Locale::En);
        assert_eq!(config.shuffle_delay, Duration::from_millis(3000));
        assert_eq!(config.flow_mode, FlowMode::Sequential);
        assert_eq!(config.unauthorized_policy, UnauthorizedPolicy::Ignore);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("TAROT_API_URL", "https://tarot.example/api/v1/"),
            ("TAROT_STORAGE_DIR", "/tmp/tarot"),
            ("TAROT_LANGUAGE", "ZH"),
            ("RUST_LOG", "debug"),
            ("SHUFFLE_DELAY_MS", "10"),
            ("READING_MODE", "prefetch"),
            ("ON_UNAUTHORIZED", "logout"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://tarot.example/api/v1");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/tarot"));
        assert_eq!(config.language, Locale::Zh);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.shuffle_delay, Duration::from_millis(10));
        assert_eq!(config.flow_mode, FlowMode::Prefetch);
        assert_eq!(config.unauthorized_policy, UnauthorizedPolicy::Logout);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[("TAROT_LANGUAGE", "fr")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "TAROT_LANGUAGE"));

        let err = Config::from_lookup(lookup(&[("SHUFFLE_DELAY_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "SHUFFLE_DELAY_MS"));

        let err = Config::from_lookup(lookup(&[("TAROT_API_URL", "localhost:8000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "TAROT_API_URL"));
    }
}
