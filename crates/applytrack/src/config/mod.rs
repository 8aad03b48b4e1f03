use std::env;
use std::fmt;
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the reconciliation runs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub tracker: TrackerConfig,
    pub matcher: MatcherConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let root = env::var("TRACKER_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let body_prefix_chars = env::var("TRACKER_BODY_PREFIX")
            .unwrap_or_else(|_| MatcherConfig::DEFAULT_BODY_PREFIX.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidBodyPrefix)?;

        let confidence_floor = env::var("TRACKER_CONFIDENCE_FLOOR")
            .unwrap_or_else(|_| MatcherConfig::DEFAULT_CONFIDENCE_FLOOR.to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidConfidenceFloor)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            tracker: TrackerConfig { root },
            matcher: MatcherConfig {
                body_prefix_chars,
                confidence_floor,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Location of the record tree the store operates on.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub root: PathBuf,
}

/// Knobs for the email matcher. Rule weights are fixed; see `tracking::matcher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Number of body characters inspected when scoring.
    pub body_prefix_chars: usize,
    /// Scores at or below this value never produce a content match.
    pub confidence_floor: u32,
}

impl MatcherConfig {
    pub const DEFAULT_BODY_PREFIX: usize = 500;
    pub const DEFAULT_CONFIDENCE_FLOOR: u32 = 10;
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            body_prefix_chars: Self::DEFAULT_BODY_PREFIX,
            confidence_floor: Self::DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidBodyPrefix,
    InvalidConfidenceFloor,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBodyPrefix => {
                write!(f, "TRACKER_BODY_PREFIX must be a non-negative integer")
            }
            ConfigError::InvalidConfidenceFloor => {
                write!(f, "TRACKER_CONFIDENCE_FLOOR must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("TRACKER_ROOT");
        env::remove_var("TRACKER_BODY_PREFIX");
        env::remove_var("TRACKER_CONFIDENCE_FLOOR");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.tracker.root, PathBuf::from("."));
        assert_eq!(config.matcher, MatcherConfig::default());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn reads_tracker_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "ci");
        env::set_var("TRACKER_ROOT", "/srv/applications");
        env::set_var("TRACKER_BODY_PREFIX", "250");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Test);
        assert_eq!(config.tracker.root, PathBuf::from("/srv/applications"));
        assert_eq!(config.matcher.body_prefix_chars, 250);
        assert_eq!(config.matcher.confidence_floor, 10);
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_confidence_floor() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TRACKER_CONFIDENCE_FLOOR", "high");
        let error = AppConfig::load().expect_err("floor must be numeric");
        assert!(matches!(error, ConfigError::InvalidConfidenceFloor));
        reset_env();
    }
}
