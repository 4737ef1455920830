//! Typed access to the River contracts.
//!
//! `bindings` holds the generated contract types. The remaining modules are
//! the hand-written layer: artifact descriptors, a runtime-ABI contract
//! handle, call options, event iteration and subscriptions, revert decoding,
//! and the registry, on-chain configuration and wallet link clients.

pub mod binder;
pub mod bindings;
pub mod call;
pub mod descriptor;
pub mod evm_error;
pub mod iterator;
pub mod on_chain_config;
pub mod registry;
pub mod retry;
pub mod subscription;
pub mod wallet_link;

pub use binder::BoundContract;
pub use call::{CallOpts, TransactOpts};
pub use descriptor::{artifact, ContractArtifact, ContractInterface, InterfaceParser, ARTIFACTS};
pub use evm_error::{CustomError, DecodedEvmError, EvmErrorDecoder};
pub use iterator::{IterState, LogIterator};
pub use on_chain_config::{OnChainConfig, OnChainSettings};
pub use registry::{RegistryEvent, RiverRegistry, StreamEventHandler, StreamRecord};
pub use retry::Backoff;
pub use subscription::Subscription;
pub use wallet_link::WalletLinker;
