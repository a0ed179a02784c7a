//! Configuration for both binaries.
//!
//! Every field has a default, so a missing or empty `isomix.toml` gives the
//! documented behaviour: 5000 prior draws, a fresh seed per run, the default
//! observation and sources, and the web page on 127.0.0.1:3000.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::density::DEFAULT_GRID_SIZE;
use crate::inference::DEFAULT_SAMPLE_COUNT;
use crate::inputs::MixingInputs;
use crate::report::RunSettings;

/// Default config path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "isomix.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inference: InferenceConfig,

    #[serde(default)]
    pub density: DensityConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Starting values for the input fields.
    #[serde(default)]
    pub defaults: MixingInputs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Prior draws per run
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,

    /// Fixed RNG seed; unset means fresh entropy per run
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_sample_count() -> usize {
    DEFAULT_SAMPLE_COUNT
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Points per density curve over [0, 1]
    #[serde(default = "default_grid_size")]
    pub grid_size: usize,
}

fn default_grid_size() -> usize {
    DEFAULT_GRID_SIZE
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.sample_count == 0 {
            return Err(ConfigError::Invalid(
                "inference.sample_count must be at least 1".to_string(),
            ));
        }
        if self.density.grid_size < 2 {
            return Err(ConfigError::Invalid(
                "density.grid_size must be at least 2".to_string(),
            ));
        }
        self.defaults
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("defaults: {e}")))?;
        Ok(())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            sample_count: self.inference.sample_count,
            grid_size: self.density.grid_size,
            include_frame: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.inference.sample_count, 5000);
        assert_eq!(config.inference.seed, None);
        assert_eq!(config.density.grid_size, 200);
        assert_eq!(config.server.bind.port(), 3000);
        assert_eq!(config.defaults, MixingInputs::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let text = r#"
            [inference]
            sample_count = 20000
            seed = 42

            [density]
            grid_size = 128

            [server]
            bind = "0.0.0.0:8080"

            [defaults]
            obs_o18 = -7.0
            sd_h2 = 3.0

            [[defaults.sources]]
            name = "rain"
            o18 = -9.0
            h2 = -65.0

            [[defaults.sources]]
            name = "river"
            o18 = -6.0
            h2 = -45.0

            [[defaults.sources]]
            name = "groundwater"
            o18 = -7.5
            h2 = -52.0
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.inference.sample_count, 20000);
        assert_eq!(config.inference.seed, Some(42));
        assert_eq!(config.run_settings().grid_size, 128);
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.defaults.obs_o18, -7.0);
        assert_eq!(config.defaults.obs_h2, -40.0);
        assert_eq!(config.defaults.sources[2].name, "groundwater");
        assert!(config.defaults.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_samples() {
        let mut config = Config::default();
        config.inference.sample_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.density.grid_size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_checks_default_inputs() {
        let mut config = Config::default();
        config.defaults.sources.pop();
        match config.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("got 2")),
            other => panic!("expected Invalid, got {other:?}"),
        }

        let config: Config = toml::from_str("[defaults]\nsd_o18 = 0.001\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.inference.sample_count, DEFAULT_SAMPLE_COUNT);
    }
}
