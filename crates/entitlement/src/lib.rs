//! Entitlement rules: the data model stored by rule entitlement modules, the
//! operation tree built from it and a concurrent evaluator that resolves
//! checks against token balances and custom entitlement contracts.

pub mod evaluator;
pub mod gated;
pub mod reader;
pub mod tree;
pub mod types;

pub use evaluator::Evaluator;
pub use gated::{process_check_request, EntitlementGated};
pub use reader::{ChainReader, ProviderChainReader};
pub use tree::{build_operation_tree, CheckOperation, CheckParams, Operation};
pub use types::{
    convert_v1_to_v2, CheckOperationType, Entitlement, Erc1155Params, LogicalOperationType, NodeVoteStatus,
    OperationType, ThresholdParams,
};
