//! Engine Configuration
//!
//! Layered settings for the game loop: built-in defaults, then `ludork.toml`
//! in the project directory, then `LUDORK_*` environment variables, then
//! command line flags.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use blueprint_runtime::DEFAULT_STEP_LIMIT;

/// File name of the per-project engine configuration
pub const CONFIG_FILE: &str = "ludork.toml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "LUDORK_";

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Figment(#[from] figment::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Game loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per second
    pub tick_rate: f64,
    /// Fixed-step updates per second
    pub fixed_tick_rate: f64,
    /// Stop after this many frames; run until interrupted when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
    /// Transition limit for a single graph execution
    pub step_limit: usize,
    /// Blueprint class directory, relative to the project
    pub classes_dir: PathBuf,
    /// Tracing filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            fixed_tick_rate: 50.0,
            max_ticks: None,
            step_limit: DEFAULT_STEP_LIMIT,
            classes_dir: PathBuf::from("classes"),
            log_filter: "ludork=info,blueprint_runtime=info".to_string(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_limit: Option<usize>,
}

impl EngineConfig {
    /// Load the layered configuration for a project directory
    pub fn load(project_dir: impl AsRef<Path>, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let file = project_dir.as_ref().join(CONFIG_FILE);
        let config: EngineConfig = Self::figment(&file)
            .merge(Serialized::defaults(cli))
            .extract()?;

        config.validate()?;
        tracing::debug!(path = %file.display(), ?config, "Loaded engine configuration");
        Ok(config)
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "tick_rate must be positive, got {}",
                self.tick_rate
            )));
        }
        if !(self.fixed_tick_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fixed_tick_rate must be positive, got {}",
                self.fixed_tick_rate
            )));
        }
        if self.step_limit == 0 {
            return Err(ConfigError::Invalid("step_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// Seconds per frame
    pub fn frame_delta(&self) -> f64 {
        1.0 / self.tick_rate
    }

    /// Seconds per fixed-step update
    pub fn fixed_delta(&self) -> f64 {
        1.0 / self.fixed_tick_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path(), &CliOverrides::default()).unwrap();

        assert_eq!(config.tick_rate, 60.0);
        assert_eq!(config.step_limit, DEFAULT_STEP_LIMIT);
        assert_eq!(config.classes_dir, PathBuf::from("classes"));
        assert_eq!(config.max_ticks, None);
    }

    #[test]
    fn test_file_then_cli() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "tick_rate = 30.0\nmax_ticks = 5\nclasses_dir = \"blueprints\"\n",
        )
        .unwrap();

        let from_file = EngineConfig::load(dir.path(), &CliOverrides::default()).unwrap();
        assert_eq!(from_file.tick_rate, 30.0);
        assert_eq!(from_file.max_ticks, Some(5));
        assert_eq!(from_file.classes_dir, PathBuf::from("blueprints"));

        let cli = CliOverrides {
            max_ticks: Some(12),
            ..Default::default()
        };
        let overridden = EngineConfig::load(dir.path(), &cli).unwrap();
        assert_eq!(overridden.tick_rate, 30.0);
        assert_eq!(overridden.max_ticks, Some(12));
    }

    #[test]
    fn test_rejects_zero_rate() {
        let dir = tempfile::tempdir().unwrap();
        let cli = CliOverrides {
            tick_rate: Some(0.0),
            ..Default::default()
        };
        let err = EngineConfig::load(dir.path(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_frame_delta() {
        let config = EngineConfig {
            tick_rate: 50.0,
            ..Default::default()
        };
        assert_eq!(config.frame_delta(), 0.02);
    }
}
