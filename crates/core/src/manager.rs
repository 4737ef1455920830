/// Loading, overriding and persisting the River configuration
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::{ConfigError, RiverConfig};

/// Environment variables read by `apply_environment_overrides`
pub const OVERRIDE_VARS: [&str; 13] = [
    "RIVER_CHAIN_RPC_URL",
    "RIVER_CHAIN_WS_URL",
    "RIVER_CHAIN_ID",
    "RIVER_BASE_RPC_URL",
    "RIVER_BASE_WS_URL",
    "RIVER_BASE_CHAIN_ID",
    "RIVER_REGISTRY_ADDRESS",
    "RIVER_WALLET_LINK_ADDRESS",
    "RIVER_ENTITLEMENT_CHECKER_ADDRESS",
    "RIVER_REGISTRY_PAGE_SIZE",
    "RIVER_REGISTRY_PARALLEL_READERS",
    "RIVER_LOG_LEVEL",
    "RIVER_LOG_FORMAT",
];

/// Override variables currently set in the environment
pub fn overridden_vars() -> Vec<&'static str> {
    OVERRIDE_VARS
        .iter()
        .copied()
        .filter(|name| env::var_os(name).is_some())
        .collect()
}

/// Configuration manager for loading, validating, and saving configurations
pub struct ConfigManager {
    config: RiverConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with the default configuration
    pub fn new() -> Self {
        Self {
            config: RiverConfig::default(),
            config_path: PathBuf::from("config.toml"),
        }
    }

    /// Load configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML configuration file: {}", path.display()))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON configuration file: {}", path.display()))?,
            _ => return Err(anyhow::anyhow!("Unsupported configuration file format. Supported formats: .toml, .json")),
        };

        debug!(path = %path.display(), "Loaded configuration file");

        let mut manager = Self {
            config,
            config_path: path.to_path_buf(),
        };

        manager.apply_environment_overrides()?;

        Ok(manager)
    }

    /// Load from `path` when it exists, otherwise start from defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from_file(path);
        }
        debug!(path = %path.display(), "Configuration file not found, using defaults");

        let mut manager = Self {
            config: RiverConfig::default(),
            config_path: path.to_path_buf(),
        };
        manager.apply_environment_overrides()?;
        Ok(manager)
    }

    /// Apply environment variable overrides
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var("RIVER_CHAIN_RPC_URL") {
            self.config.river_chain.rpc_url = url;
        }
        if let Ok(url) = env::var("RIVER_CHAIN_WS_URL") {
            self.config.river_chain.ws_url = Some(url);
        }
        if let Ok(chain_id) = env::var("RIVER_CHAIN_ID") {
            self.config.river_chain.chain_id = chain_id
                .parse()
                .with_context(|| "Invalid RIVER_CHAIN_ID value")?;
        }

        if let Ok(url) = env::var("RIVER_BASE_RPC_URL") {
            self.config.base_chain.rpc_url = url;
        }
        if let Ok(url) = env::var("RIVER_BASE_WS_URL") {
            self.config.base_chain.ws_url = Some(url);
        }
        if let Ok(chain_id) = env::var("RIVER_BASE_CHAIN_ID") {
            self.config.base_chain.chain_id = chain_id
                .parse()
                .with_context(|| "Invalid RIVER_BASE_CHAIN_ID value")?;
        }

        if let Ok(address) = env::var("RIVER_REGISTRY_ADDRESS") {
            self.config.contracts.river_registry = address;
        }
        if let Ok(address) = env::var("RIVER_WALLET_LINK_ADDRESS") {
            self.config.contracts.wallet_link = address;
        }
        if let Ok(address) = env::var("RIVER_ENTITLEMENT_CHECKER_ADDRESS") {
            self.config.contracts.entitlement_checker = address;
        }

        if let Ok(page_size) = env::var("RIVER_REGISTRY_PAGE_SIZE") {
            self.config.registry.page_size = page_size
                .parse()
                .with_context(|| "Invalid RIVER_REGISTRY_PAGE_SIZE value")?;
        }
        if let Ok(readers) = env::var("RIVER_REGISTRY_PARALLEL_READERS") {
            self.config.registry.parallel_readers = readers
                .parse()
                .with_context(|| "Invalid RIVER_REGISTRY_PARALLEL_READERS value")?;
        }

        if let Ok(level) = env::var("RIVER_LOG_LEVEL") {
            self.config.log.level = level;
        }
        if let Ok(format) = env::var("RIVER_LOG_FORMAT") {
            self.config.log.format = format;
        }

        let applied = overridden_vars();
        if !applied.is_empty() {
            debug!(vars = ?applied, "Applied environment overrides");
        }
        Ok(())
    }

    /// Validate the current configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    /// Get the configuration
    pub fn config(&self) -> &RiverConfig {
        &self.config
    }

    /// Get a mutable reference to the configuration
    pub fn config_mut(&mut self) -> &mut RiverConfig {
        &mut self.config
    }

    /// Path the configuration was loaded from
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Save the current configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::to_string_pretty(&self.config)
                .with_context(|| "Failed to serialize configuration to TOML")?,
            Some("json") => serde_json::to_string_pretty(&self.config)
                .with_context(|| "Failed to serialize configuration to JSON")?,
            _ => return Err(anyhow::anyhow!("Unsupported configuration file format. Supported formats: .toml, .json")),
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;
        info!(path = %path.display(), "Saved configuration");

        Ok(())
    }

    /// Generate a default configuration file
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let manager = ConfigManager {
            config: RiverConfig::default(),
            config_path: path.as_ref().to_path_buf(),
        };

        manager.save_to_file(path)?;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("RIVER_REGISTRY_PAGE_SIZE", "250");
        std::env::set_var("RIVER_LOG_LEVEL", "debug");
        std::env::set_var("RIVER_BASE_WS_URL", "ws://localhost:8545");

        let mut manager = ConfigManager::new();
        manager.apply_environment_overrides().unwrap();

        assert_eq!(manager.config.registry.page_size, 250);
        assert_eq!(manager.config.log.level, "debug");
        assert_eq!(manager.config.base_chain.ws_url.as_deref(), Some("ws://localhost:8545"));

        let applied = overridden_vars();
        assert!(applied.contains(&"RIVER_REGISTRY_PAGE_SIZE"));
        assert!(applied.contains(&"RIVER_BASE_WS_URL"));

        std::env::remove_var("RIVER_REGISTRY_PAGE_SIZE");
        std::env::remove_var("RIVER_LOG_LEVEL");
        std::env::remove_var("RIVER_BASE_WS_URL");
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = tempfile::tempdir().unwrap();

        let mut manager = ConfigManager::new();
        manager.config_mut().contracts.wallet_link =
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string();

        let toml_path = temp_dir.path().join("river.toml");
        manager.save_to_file(&toml_path).unwrap();
        let loaded = ConfigManager::load_from_file(&toml_path).unwrap();
        assert_eq!(loaded.config().contracts.wallet_link, manager.config().contracts.wallet_link);
        assert_eq!(loaded.config_path(), toml_path.as_path());

        let json_path = temp_dir.path().join("river.json");
        manager.save_to_file(&json_path).unwrap();
        let loaded = ConfigManager::load_from_file(&json_path).unwrap();
        assert_eq!(loaded.config().river_chain.chain_id, 6524490);
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("river.yaml");
        std::fs::write(&path, "log: {}").unwrap();
        assert!(ConfigManager::load_from_file(&path).is_err());
        assert!(ConfigManager::new().save_to_file(&path).is_err());
    }

    #[test]
    fn test_generate_default_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        ConfigManager::generate_default_config(&path).unwrap();
        let loaded = ConfigManager::load_from_file(&path).unwrap();
        assert!(loaded.validate().is_ok());

        let missing = temp_dir.path().join("missing.toml");
        let defaults = ConfigManager::load_or_default(&missing).unwrap();
        assert_eq!(defaults.config_path(), missing.as_path());
    }
}
