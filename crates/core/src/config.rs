//! Configuration for chain access, contract addresses and registry reads

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Main configuration for the River chain tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiverConfig {
    /// Chain hosting the stream and node registry
    pub river_chain: ChainConfig,
    /// Chain hosting spaces, wallet links and the entitlement checker
    pub base_chain: ChainConfig,
    /// Deployed contract addresses
    pub contracts: ContractsConfig,
    /// Registry read tuning
    pub registry: RegistryReaderConfig,
    /// Chains consulted when evaluating entitlement rules
    pub chains: Vec<ChainConfig>,
    /// Logging output
    pub log: LogConfig,
}

/// Configuration for a single EVM chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    /// WebSocket endpoint used for live log subscriptions
    pub ws_url: Option<String>,
    /// Whether the native token is ether, used for ETH balance checks
    pub ether_based: bool,
}

/// Contract addresses as hex strings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub river_registry: String,
    pub wallet_link: String,
    pub entitlement_checker: String,
}

/// Tuning for paginated registry reads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryReaderConfig {
    /// Streams requested per page
    pub page_size: i64,
    /// Number of concurrent page readers, 1 or less reads sequentially
    pub parallel_readers: usize,
    /// Maximum number of retries per page call, 0 means bounded by time only
    pub max_retries: u32,
    /// Upper bound on the total time spent retrying a page call, 0 means unbounded
    pub max_retry_elapsed_ms: u64,
    /// Timeout for one page call, 0 disables it
    pub single_call_timeout_ms: u64,
    /// Interval between progress log lines
    pub progress_report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Output format: "pretty" or "json"
    pub format: String,
}

impl Default for RiverConfig {
    fn default() -> Self {
        Self {
            river_chain: ChainConfig {
                chain_id: 6524490,
                name: "river".to_string(),
                rpc_url: "http://localhost:8546".to_string(),
                ws_url: None,
                ether_based: false,
            },
            base_chain: ChainConfig {
                chain_id: 31337,
                name: "base".to_string(),
                rpc_url: "http://localhost:8545".to_string(),
                ws_url: None,
                ether_based: true,
            },
            contracts: ContractsConfig::default(),
            registry: RegistryReaderConfig::default(),
            chains: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            name: "mainnet".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            ws_url: None,
            ether_based: true,
        }
    }
}

impl Default for RegistryReaderConfig {
    fn default() -> Self {
        Self {
            page_size: 5000,
            parallel_readers: 8,
            max_retries: 0,
            max_retry_elapsed_ms: 300_000,
            single_call_timeout_ms: 30_000,
            progress_report_interval_secs: 10,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl RegistryReaderConfig {
    pub fn max_retry_elapsed(&self) -> Duration {
        Duration::from_millis(self.max_retry_elapsed_ms)
    }

    pub fn single_call_timeout(&self) -> Option<Duration> {
        (self.single_call_timeout_ms > 0).then(|| Duration::from_millis(self.single_call_timeout_ms))
    }

    pub fn progress_report_interval(&self) -> Duration {
        if self.progress_report_interval_secs == 0 {
            Duration::from_secs(10)
        } else {
            Duration::from_secs(self.progress_report_interval_secs)
        }
    }
}

impl ContractsConfig {
    pub fn river_registry_address(&self) -> Result<Address, ConfigError> {
        parse_address("contracts.river_registry", &self.river_registry)
    }

    pub fn wallet_link_address(&self) -> Result<Address, ConfigError> {
        parse_address("contracts.wallet_link", &self.wallet_link)
    }

    pub fn entitlement_checker_address(&self) -> Result<Address, ConfigError> {
        parse_address("contracts.entitlement_checker", &self.entitlement_checker)
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingAddress { field: field.to_string() });
    }
    Address::from_str(value).map_err(|_| ConfigError::InvalidAddress {
        field: field.to_string(),
        value: value.to_string(),
    })
}

impl ChainConfig {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::InvalidChainId { chain: field.to_string() });
        }

        if self.rpc_url.is_empty() {
            return Err(ConfigError::MissingRpcUrl { chain: field.to_string() });
        }

        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(ConfigError::InvalidRpcUrl {
                chain: field.to_string(),
                url: self.rpc_url.clone(),
            });
        }

        if let Some(ws_url) = &self.ws_url {
            if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
                return Err(ConfigError::InvalidWsUrl {
                    chain: field.to_string(),
                    url: ws_url.clone(),
                });
            }
        }

        Ok(())
    }
}

impl RiverConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.river_chain.validate("river_chain")?;
        self.base_chain.validate("base_chain")?;

        let mut seen = HashSet::new();
        for chain in &self.chains {
            chain.validate(&chain.name)?;
            if !seen.insert(chain.chain_id) {
                return Err(ConfigError::DuplicateChainId { chain_id: chain.chain_id });
            }
        }

        // Empty addresses are allowed until a command needs them
        for (field, value) in [
            ("contracts.river_registry", &self.contracts.river_registry),
            ("contracts.wallet_link", &self.contracts.wallet_link),
            ("contracts.entitlement_checker", &self.contracts.entitlement_checker),
        ] {
            if !value.is_empty() {
                parse_address(field, value)?;
            }
        }

        if self.registry.page_size <= 0 {
            return Err(ConfigError::InvalidPageSize);
        }

        match self.log.format.as_str() {
            "pretty" | "json" => {}
            other => return Err(ConfigError::InvalidLogFormat { format: other.to_string() }),
        }

        Ok(())
    }

    /// Chain ids whose native token is ether
    pub fn ether_based_chains(&self) -> Vec<u64> {
        self.chains
            .iter()
            .filter(|c| c.ether_based)
            .map(|c| c.chain_id)
            .collect()
    }

    /// Look up an entitlement chain by id
    pub fn chain(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid chain id for chain '{chain}': must be greater than 0")]
    InvalidChainId { chain: String },
    #[error("Missing RPC URL for chain '{chain}'")]
    MissingRpcUrl { chain: String },
    #[error("Invalid RPC URL for chain '{chain}': '{url}'")]
    InvalidRpcUrl { chain: String, url: String },
    #[error("Invalid WebSocket URL for chain '{chain}': '{url}'")]
    InvalidWsUrl { chain: String, url: String },
    #[error("Chain id {chain_id} is configured more than once")]
    DuplicateChainId { chain_id: u64 },
    #[error("Missing contract address for '{field}'")]
    MissingAddress { field: String },
    #[error("Invalid contract address for '{field}': '{value}'")]
    InvalidAddress { field: String, value: String },
    #[error("Invalid page size: must be greater than 0")]
    InvalidPageSize,
    #[error("Invalid log format '{format}': expected 'pretty' or 'json'")]
    InvalidLogFormat { format: String },
}
