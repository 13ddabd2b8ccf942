//! Configuration management for Hashledger

use crate::error::ChainError;
use crate::miner::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    /// Trailing zero hex characters a proof digest must end with.
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    #[serde(default = "default_reward")]
    pub reward: u64,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            reward: default_reward(),
            threads: default_threads(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}

fn default_reward() -> u64 {
    1
}

fn default_threads() -> usize {
    1
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.network.api_port == 0 {
            return Err(ChainError::ConfigError(
                "network.api_port must be non-zero".to_string(),
            ));
        }
        if self.miner.difficulty == 0 || self.miner.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::ConfigError(format!(
                "miner.difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.miner.difficulty
            )));
        }
        if self.miner.threads == 0 {
            return Err(ChainError::ConfigError(
                "miner.threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.network.host, self.network.api_port)
    }
}

/// Loads `path`, falling back to defaults when the file is absent.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    let config: Config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)?
    } else {
        tracing::info!("No config file at {}; using defaults", path.display());
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.network.api_port, 5000);
        assert_eq!(config.miner.difficulty, 4);
        assert_eq!(config.miner.reward, 1);
        assert_eq!(config.miner.threads, 1);
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_partial_file_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[miner]\ndifficulty = 2\nthreads = 4").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.miner.difficulty, 2);
        assert_eq!(config.miner.threads, 4);
        assert_eq!(config.miner.reward, 1);
        assert_eq!(config.network.api_port, 5000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[miner]\ndifficulty = 0").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ChainError::ConfigError(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[network]\napi_port = \"not a port\"").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ChainError::ConfigError(_))
        ));
    }
}
