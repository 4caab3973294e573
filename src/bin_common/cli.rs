//! CLI utilities for binaries
//!
//! Resolves which configuration file to load.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Monitor configuration (config/ocd_monitor.yaml)
    Monitor,
    /// Custom path, usually from the command line
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Monitor => "config/ocd_monitor.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        "OCD_MONITOR_CONFIG"
    }
}

/// Load configuration path from environment or use default
///
/// An explicit [`ConfigType::Custom`] path wins over the environment.
///
/// # Examples
/// ```
/// use ocd_monitor::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Custom("probe.yaml".into()));
/// assert_eq!(path.to_str(), Some("probe.yaml"));
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = config_type {
        return path.into();
    }
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_type_paths() {
        assert_eq!(ConfigType::Monitor.default_path(), "config/ocd_monitor.yaml");
        let custom = ConfigType::Custom("bench/stm32.yaml".to_string());
        assert_eq!(custom.default_path(), "bench/stm32.yaml");
    }

    #[test]
    fn test_custom_path_ignores_environment() {
        let path = load_config_from_env(ConfigType::Custom("bench/stm32.yaml".to_string()));
        assert_eq!(path.to_str().unwrap(), "bench/stm32.yaml");
    }
}
