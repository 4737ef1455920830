//! Operation tree built from post-order rule data

use ethers::types::{Address, U256};
use serde::Serialize;
use tracing::debug;

use river_common::{Error, Result};
use river_contracts::bindings::rule_entitlement_v2::{CheckOperationV2, RuleDataV2};

use crate::types::{CheckOperationType, Erc1155Params, LogicalOperationType, OperationType, ThresholdParams};

/// Decoded check parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckParams {
    None,
    Threshold(U256),
    Erc1155 { threshold: U256, token_id: U256 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOperation {
    pub check_type: CheckOperationType,
    pub chain_id: U256,
    pub contract_address: Address,
    pub params: CheckParams,
}

impl CheckOperation {
    pub fn threshold(&self) -> U256 {
        match self.params {
            CheckParams::Threshold(threshold) | CheckParams::Erc1155 { threshold, .. } => threshold,
            CheckParams::None => U256::zero(),
        }
    }
}

impl TryFrom<&CheckOperationV2> for CheckOperation {
    type Error = Error;

    fn try_from(raw: &CheckOperationV2) -> Result<Self> {
        let check_type = CheckOperationType::try_from(raw.op_type)?;
        let params = match check_type {
            CheckOperationType::Mock
            | CheckOperationType::Erc20
            | CheckOperationType::Erc721
            | CheckOperationType::EthBalance => {
                CheckParams::Threshold(ThresholdParams::decode_params(&raw.params)?.threshold)
            }
            CheckOperationType::Erc1155 => {
                let params = Erc1155Params::decode_params(&raw.params)?;
                CheckParams::Erc1155 {
                    threshold: params.threshold,
                    token_id: params.token_id,
                }
            }
            CheckOperationType::IsEntitled | CheckOperationType::None => CheckParams::None,
        };
        Ok(Self {
            check_type,
            chain_id: raw.chain_id,
            contract_address: raw.contract_address,
            params,
        })
    }
}

/// A node of the rule tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Check(CheckOperation),
    Logical {
        op: LogicalOperationType,
        left: Box<Operation>,
        right: Box<Operation>,
    },
}

impl Operation {
    pub fn and(left: Operation, right: Operation) -> Self {
        Operation::Logical {
            op: LogicalOperationType::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: Operation, right: Operation) -> Self {
        Operation::Logical {
            op: LogicalOperationType::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Number of check operations below this node
    pub fn check_count(&self) -> usize {
        match self {
            Operation::Check(_) => 1,
            Operation::Logical { left, right, .. } => left.check_count() + right.check_count(),
        }
    }
}

/// Build the tree. `operations` is a post-order walk: checks push onto a
/// stack and each logical operation pops its right then left operand.
pub fn build_operation_tree(rule_data: &RuleDataV2) -> Result<Operation> {
    let mut stack: Vec<Operation> = Vec::new();

    for (position, operation) in rule_data.operations.iter().enumerate() {
        let index = operation.index as usize;
        match OperationType::try_from(operation.op_type)? {
            OperationType::Check => {
                let raw = rule_data.check_operations.get(index).ok_or_else(|| {
                    Error::validation(format!(
                        "Invalid check operation index {} at operation {}",
                        index, position
                    ))
                })?;
                stack.push(Operation::Check(CheckOperation::try_from(raw)?));
            }
            OperationType::Logical => {
                let logical = rule_data.logical_operations.get(index).ok_or_else(|| {
                    Error::validation(format!(
                        "Invalid logical operation index {} at operation {}",
                        index, position
                    ))
                })?;
                let op = match LogicalOperationType::try_from(logical.log_op_type)? {
                    LogicalOperationType::And => LogicalOperationType::And,
                    LogicalOperationType::Or => LogicalOperationType::Or,
                    LogicalOperationType::None => {
                        return Err(Error::validation("Unknown logical operation type"));
                    }
                };
                let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                    return Err(Error::validation("Invalid post-order array, not enough operands"));
                };
                stack.push(Operation::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                });
            }
            OperationType::None => return Err(Error::validation("Unknown operation type")),
        }
        debug!(position, depth = stack.len(), "Decoded operation");
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(Error::validation("Invalid post-order array")),
    }
}
