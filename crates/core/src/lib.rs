//! Configuration and logging for the River chain tools

pub mod config;
pub mod logging;
pub mod manager;

pub use config::{ChainConfig, ConfigError, ContractsConfig, LogConfig, RegistryReaderConfig, RiverConfig};
pub use manager::ConfigManager;
