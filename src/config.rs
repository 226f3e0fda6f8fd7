//! Configuration module for the daemon.
//!
//! Describes the display configurations reported by the hardware, the one
//! currently active, and an optional startup policy. The file is read once at
//! startup; policy changes made at runtime are never written back.

use crate::error::{ConfigError, RefreshRateError};
use crate::ipc_server::DEFAULT_SOCKET_PATH;
use crate::refresh_rate::{ConfigId, InputConfig};
use crate::refresh_rate_configs::RefreshRateConfigs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Startup refresh rate policy.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub default_config_id: ConfigId,
    pub min_fps: f32,
    pub max_fps: f32,
}

/// Daemon configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub display_configs: Vec<InputConfig>,
    pub active_config_id: ConfigId,
    #[serde(default)]
    pub policy: Option<PolicyConfig>,
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

impl Default for Config {
    /// A 60/90/120Hz panel running at 60Hz.
    fn default() -> Self {
        Self {
            display_configs: vec![
                InputConfig::new(0, 0, 16_666_667),
                InputConfig::new(1, 0, 11_111_111),
                InputConfig::new(2, 0, 8_333_333),
            ],
            active_config_id: ConfigId::new(0),
            policy: None,
            socket_path: default_socket_path(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    /// Returns Ok(()) if valid, Err with descriptive message if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display_configs.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one display config is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for display in &self.display_configs {
            if display.vsync_period <= 0 {
                return Err(ConfigError::ValidationError(format!(
                    "display config {} has non-positive vsync period ({}ns)",
                    display.config_id, display.vsync_period
                )));
            }
            if !seen.insert(display.config_id) {
                return Err(ConfigError::ValidationError(format!(
                    "display config {} is listed more than once",
                    display.config_id
                )));
            }
        }

        if !seen.contains(&self.active_config_id) {
            return Err(ConfigError::ValidationError(format!(
                "active config {} is not a listed display config",
                self.active_config_id
            )));
        }

        if let Some(policy) = &self.policy {
            if !seen.contains(&policy.default_config_id) {
                return Err(ConfigError::ValidationError(format!(
                    "policy default config {} is not a listed display config",
                    policy.default_config_id
                )));
            }
            if policy.min_fps > policy.max_fps {
                return Err(ConfigError::ValidationError(format!(
                    "policy min_fps ({}) cannot be greater than max_fps ({})",
                    policy.min_fps, policy.max_fps
                )));
            }
        }

        if self.socket_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "socket_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from file or use defaults.
    /// If the file doesn't exist, returns the default config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No configuration at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Build the engine and apply the startup policy, if any.
    pub fn build_engine(&self) -> Result<RefreshRateConfigs, RefreshRateError> {
        let configs = RefreshRateConfigs::new(&self.display_configs, self.active_config_id)?;
        if let Some(policy) = &self.policy {
            configs.set_policy(policy.default_config_id, policy.min_fps, policy.max_fps)?;
        }
        Ok(configs)
    }

    /// Get the default config path (~/.config/refresh-rate-policy/config.json).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("refresh-rate-policy")
            .join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("config.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.display_configs.len(), 3);
        assert_eq!(config.socket_path, DEFAULT_SOCKET_PATH);
    }

    #[test]
    fn test_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "display_configs": [
                    {"config_id": 0, "config_group": 0, "vsync_period": 16666667},
                    {"config_id": 1, "config_group": 1, "vsync_period": 8333333}
                ],
                "active_config_id": 1,
                "policy": {"default_config_id": 0, "min_fps": 60.0, "max_fps": 120.0}
            }"#,
        );

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.display_configs[1], InputConfig::new(1, 1, 8_333_333));
        assert_eq!(config.active_config_id, ConfigId::new(1));
        assert_eq!(config.socket_path, DEFAULT_SOCKET_PATH);

        let engine = config.build_engine().unwrap();
        assert_eq!(engine.get_policy().default_config_id, ConfigId::new(0));
        assert_eq!(engine.get_current_refresh_rate().config_id, ConfigId::new(1));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "{ not json");
        let err = Config::load_or_default(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_rejects_zero_vsync_period() {
        let mut config = Config::default();
        config.display_configs.push(InputConfig::new(7, 0, 0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("non-positive vsync period"));
    }

    #[test]
    fn test_validation_rejects_duplicate_ids() {
        let mut config = Config::default();
        config.display_configs.push(InputConfig::new(1, 3, 20_000_000));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_active_config() {
        let config = Config {
            active_config_id: ConfigId::new(9),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_display_list() {
        let config = Config {
            display_configs: Vec::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_engine_rejects_policy_excluding_default() {
        let config = Config {
            policy: Some(PolicyConfig {
                default_config_id: ConfigId::new(2),
                min_fps: 60.0,
                max_fps: 90.0,
            }),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        let err = config.build_engine().unwrap_err();
        assert!(matches!(err, RefreshRateError::InvalidArgument(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_validation_rejects_inverted_policy(
            min_fps in 1.0f32..240.0,
            gap in 0.01f32..100.0,
        ) {
            let config = Config {
                policy: Some(PolicyConfig {
                    default_config_id: ConfigId::new(0),
                    min_fps: min_fps + gap,
                    max_fps: min_fps,
                }),
                ..Config::default()
            };

            let result = config.validate();
            if let Err(ConfigError::ValidationError(msg)) = result {
                prop_assert!(msg.contains("cannot be greater than"));
            } else {
                prop_assert!(false, "Should be ValidationError");
            }
        }
    }
}
