/// River chain tools entry point
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use ethers::contract::LogMeta;
use ethers::providers::{Http, Middleware, Provider, Ws};
use ethers::types::{Address, U256};
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};

use river_common::{stream_id_hex, BlockNum, StreamId};
use river_contracts::bindings::mock_river_registry::{
    StreamAllocatedFilter, StreamLastMiniblockUpdatedFilter, StreamPlacementUpdatedFilter,
};
use river_contracts::bindings::RuleEntitlementV2;
use river_contracts::call::{self, CallOpts};
use river_contracts::{
    artifact, EvmErrorDecoder, InterfaceParser, OnChainConfig, RiverRegistry, StreamEventHandler, StreamRecord,
    WalletLinker, ARTIFACTS,
};
use river_core::{logging, ConfigManager, RiverConfig};
use river_entitlement::{build_operation_tree, Evaluator, ProviderChainReader};

#[derive(Parser)]
#[command(name = "river-chain")]
#[command(author, version, about = "River contract bindings and chain inspection", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the bundled contract artifacts
    Abi {
        #[command(subcommand)]
        action: AbiAction,
    },

    /// Decode revert data against every bundled contract
    DecodeError {
        /// Hex encoded revert data
        data: String,
    },

    /// List registered nodes
    Nodes {
        /// Block to read at, latest when omitted
        #[arg(long, default_value_t = 0)]
        block: u64,
    },

    /// Show one stream
    Stream {
        /// Hex encoded stream id
        id: String,

        #[arg(long, default_value_t = 0)]
        block: u64,
    },

    /// List streams
    Streams {
        #[arg(long, default_value_t = 0)]
        block: u64,

        /// Stop after this many streams
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the on-chain settings in effect at a block
    Settings {
        #[arg(long, default_value_t = 0)]
        block: u64,
    },

    /// List wallets linked with an address
    Wallets {
        address: String,
    },

    /// Follow stream events over the river chain websocket
    WatchStreams {
        /// First block to deliver, latest when omitted
        #[arg(long)]
        from_block: Option<u64>,
    },

    /// Evaluate a role's rule entitlement for a wallet
    Evaluate {
        /// RuleEntitlementV2 contract address
        rule_entitlement: String,

        /// Role id
        role_id: u64,

        /// Wallet to check, linked wallets are included
        wallet: String,
    },

    /// Generate a default configuration file
    InitConfig {
        /// Output file path
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum AbiAction {
    /// List bundled contracts
    List,

    /// Show the parsed interface of a contract
    Show {
        contract: String,
    },

    /// Compare a bundled interface against a compiled artifact
    Check {
        contract: String,

        /// Artifact JSON produced by the contract build
        artifact: PathBuf,
    },
}

#[derive(Serialize)]
struct ArtifactSummary {
    name: &'static str,
    deployable: bool,
    functions: usize,
    events: usize,
    errors: usize,
}

#[derive(Serialize)]
struct Evaluation {
    role_id: u64,
    wallets: Vec<Address>,
    rule: river_entitlement::Operation,
    entitled: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        ConfigManager::generate_default_config(path)?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let manager = ConfigManager::load_or_default(&cli.config)?;
    manager.validate()?;
    let config = manager.config().clone();
    logging::init(&config.log)?;

    match cli.command {
        Commands::Abi { action } => run_abi(action),
        Commands::DecodeError { data } => {
            let bytes = hex::decode(data.trim_start_matches("0x")).context("Revert data is not valid hex")?;
            let decoded = EvmErrorDecoder::with_bundled_errors()?.decode(&bytes)?;
            println!("{}", decoded);
            Ok(())
        }
        Commands::Nodes { block } => {
            let registry = river_registry(&config)?;
            print_json(&registry.get_all_nodes(BlockNum(block)).await?)
        }
        Commands::Stream { id, block } => {
            let registry = river_registry(&config)?;
            print_json(&registry.get_stream(parse_stream_id(&id)?, BlockNum(block)).await?)
        }
        Commands::Streams { block, limit } => {
            let registry = river_registry(&config)?;
            let mut streams: Vec<StreamRecord> = Vec::new();
            registry
                .for_all_streams(BlockNum(block), |record| {
                    streams.push(record);
                    limit.map_or(true, |limit| streams.len() < limit)
                })
                .await?;
            print_json(&streams)
        }
        Commands::Settings { block } => {
            let registry = river_registry(&config)?;
            let block = if block == 0 {
                registry.contract().client().get_block_number().await?.as_u64()
            } else {
                block
            };
            let on_chain = OnChainConfig::load(registry.contract(), block).await?;
            print_json(&*on_chain.get_on_block(block))
        }
        Commands::Wallets { address } => {
            let linker = wallet_linker(&config)?;
            print_json(&linker.get_linked_wallets(parse_address(&address)?).await?)
        }
        Commands::WatchStreams { from_block } => watch_streams(&config, from_block).await,
        Commands::Evaluate {
            rule_entitlement,
            role_id,
            wallet,
        } => evaluate(&config, &rule_entitlement, role_id, &wallet).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn run_abi(action: AbiAction) -> Result<()> {
    match action {
        AbiAction::List => {
            let mut summaries = Vec::with_capacity(ARTIFACTS.len());
            for artifact in ARTIFACTS {
                let interface = artifact.interface()?;
                summaries.push(ArtifactSummary {
                    name: artifact.name,
                    deployable: artifact.is_deployable(),
                    functions: interface.functions.len(),
                    events: interface.events.len(),
                    errors: interface.errors.len(),
                });
            }
            print_json(&summaries)
        }
        AbiAction::Show { contract } => {
            let artifact = artifact(&contract).ok_or_else(|| anyhow!("Unknown contract: {}", contract))?;
            print_json(&artifact.interface()?)
        }
        AbiAction::Check { contract, artifact: path } => {
            let bundled = artifact(&contract).ok_or_else(|| anyhow!("Unknown contract: {}", contract))?;
            let deployed = InterfaceParser::new().parse_file(&path)?;
            let missing = bundled.interface()?.missing_from(&deployed);
            if missing.is_empty() {
                println!("{} matches {}", bundled.name, path.display());
                return Ok(());
            }
            print_json(&missing)?;
            bail!("{} is missing {} item(s) from {}", path.display(), missing.len(), bundled.name)
        }
    }
}

fn river_registry(config: &RiverConfig) -> Result<RiverRegistry<Provider<Http>>> {
    let address = config.contracts.river_registry_address()?;
    let provider = http_provider(&config.river_chain.rpc_url)?;
    Ok(RiverRegistry::new(address, Arc::new(provider), config.registry.clone())?)
}

fn wallet_linker(config: &RiverConfig) -> Result<WalletLinker<Provider<Http>>> {
    let address = config.contracts.wallet_link_address()?;
    let provider = http_provider(&config.base_chain.rpc_url)?;
    Ok(WalletLinker::new(address, Arc::new(provider)))
}

fn http_provider(url: &str) -> Result<Provider<Http>> {
    Provider::<Http>::try_from(url).with_context(|| format!("Invalid RPC URL: {}", url))
}

/// Prints stream events as JSON lines
struct PrintHandler;

impl PrintHandler {
    fn emit<T: Serialize>(&self, kind: &str, event: &T, meta: &LogMeta) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{} {} {}", meta.block_number, kind, line),
            Err(e) => warn!(error = %e, kind, "Failed to render event"),
        }
    }
}

impl StreamEventHandler for PrintHandler {
    fn on_allocated(&mut self, event: StreamAllocatedFilter, meta: LogMeta) {
        self.emit("StreamAllocated", &event, &meta);
    }

    fn on_last_miniblock_updated(&mut self, event: StreamLastMiniblockUpdatedFilter, meta: LogMeta) {
        self.emit("StreamLastMiniblockUpdated", &event, &meta);
    }

    fn on_placement_updated(&mut self, event: StreamPlacementUpdatedFilter, meta: LogMeta) {
        self.emit("StreamPlacementUpdated", &event, &meta);
    }
}

async fn watch_streams(config: &RiverConfig, from_block: Option<u64>) -> Result<()> {
    let ws_url = config
        .river_chain
        .ws_url
        .as_deref()
        .ok_or_else(|| anyhow!("river_chain.ws_url is required to watch streams"))?;
    let provider = Provider::<Ws>::connect(ws_url)
        .await
        .with_context(|| format!("Failed to connect to {}", ws_url))?;
    let start_block = match from_block {
        Some(block) => block,
        None => provider.get_block_number().await?.as_u64(),
    };

    let address = config.contracts.river_registry_address()?;
    let registry = RiverRegistry::new(address, Arc::new(provider), config.registry.clone())?;
    let mut watch = registry.on_stream_event(start_block, PrintHandler);
    info!(start_block, registry = ?address, "Watching stream events, press Ctrl+C to stop");

    signal::ctrl_c().await?;
    info!("Shutting down");
    watch.stop().await?;
    Ok(())
}

async fn evaluate(config: &RiverConfig, rule_entitlement: &str, role_id: u64, wallet: &str) -> Result<()> {
    let wallet = parse_address(wallet)?;
    let base = Arc::new(http_provider(&config.base_chain.rpc_url)?);

    let contract = RuleEntitlementV2::new(parse_address(rule_entitlement)?, base.clone());
    let rule_data = call::call(contract.get_rule_data_v2(U256::from(role_id)), &CallOpts::default())
        .await
        .map_err(river_common::Error::from)?;

    let wallets = if config.contracts.wallet_link.is_empty() {
        vec![wallet]
    } else {
        wallet_linker(config)?.get_linked_wallets(wallet).await?
    };

    let reader = ProviderChainReader::from_config(&config.chains)?;
    let evaluator = Evaluator::new(Arc::new(reader));
    let rule = build_operation_tree(&rule_data)?;
    let entitled = evaluator.evaluate(&rule, &wallets).await?;

    print_json(&Evaluation {
        role_id,
        wallets,
        rule,
        entitled,
    })
}

fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value).with_context(|| format!("Invalid address: {}", value))
}

fn parse_stream_id(value: &str) -> Result<StreamId> {
    let bytes = hex::decode(value.trim_start_matches("0x")).context("Stream id is not valid hex")?;
    let id: StreamId = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow!("Stream id must be 32 bytes, got {}", b.len()))?;
    info!(stream_id = %stream_id_hex(&id), "Reading stream");
    Ok(id)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_stream_id() {
        let hex_id = format!("0x{}", "ab".repeat(32));
        assert_eq!(parse_stream_id(&hex_id).unwrap(), [0xab; 32]);
        assert!(parse_stream_id("0xabcd").is_err());
        assert!(parse_stream_id("zz").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["river-chain", "--config", "river.toml", "streams", "--limit", "5"]);
        assert_eq!(cli.config, Path::new("river.toml"));
        assert!(matches!(cli.command, Commands::Streams { block: 0, limit: Some(5) }));

        let cli = Cli::parse_from(["river-chain", "abi", "check", "WalletLink", "out/WalletLink.json"]);
        assert!(matches!(cli.command, Commands::Abi { action: AbiAction::Check { .. } }));
    }
}
