//! Rule data model shared by the tree builder and the evaluator

use std::fmt;

use ethers::abi::{AbiType, ParamType, Token, Tokenizable};
use ethers::contract::{EthAbiCodec, EthAbiType};
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use river_common::{Error, Result};
use river_contracts::bindings::rule_entitlement::RuleData;
use river_contracts::bindings::rule_entitlement_v2::{self as v2, CheckOperationV2, RuleDataV2};

pub const MODULE_TYPE_RULE_ENTITLEMENT: &str = "RuleEntitlement";
pub const MODULE_TYPE_RULE_ENTITLEMENT_V2: &str = "RuleEntitlementV2";
pub const MODULE_TYPE_USER_ENTITLEMENT: &str = "UserEntitlement";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    None,
    Check,
    Logical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckOperationType {
    None,
    Mock,
    Erc20,
    Erc721,
    Erc1155,
    IsEntitled,
    EthBalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperationType {
    None,
    And,
    Or,
}

/// Outcome a node posts for an entitlement check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeVoteStatus {
    NotVoted,
    Passed,
    Failed,
}

impl TryFrom<u8> for OperationType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(OperationType::None),
            1 => Ok(OperationType::Check),
            2 => Ok(OperationType::Logical),
            other => Err(Error::validation(format!("Unknown operation type {}", other))),
        }
    }
}

impl TryFrom<u8> for CheckOperationType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CheckOperationType::None),
            1 => Ok(CheckOperationType::Mock),
            2 => Ok(CheckOperationType::Erc20),
            3 => Ok(CheckOperationType::Erc721),
            4 => Ok(CheckOperationType::Erc1155),
            5 => Ok(CheckOperationType::IsEntitled),
            6 => Ok(CheckOperationType::EthBalance),
            other => Err(Error::validation(format!("unknown operation {}", other))),
        }
    }
}

impl TryFrom<u8> for LogicalOperationType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(LogicalOperationType::None),
            1 => Ok(LogicalOperationType::And),
            2 => Ok(LogicalOperationType::Or),
            other => Err(Error::validation(format!("Unknown logical operation type {}", other))),
        }
    }
}

impl From<CheckOperationType> for u8 {
    fn from(value: CheckOperationType) -> u8 {
        value as u8
    }
}

impl From<NodeVoteStatus> for u8 {
    fn from(value: NodeVoteStatus) -> u8 {
        value as u8
    }
}

impl NodeVoteStatus {
    pub fn from_result(passed: bool) -> Self {
        if passed {
            NodeVoteStatus::Passed
        } else {
            NodeVoteStatus::Failed
        }
    }
}

impl fmt::Display for CheckOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckOperationType::None => "CheckNONE",
            CheckOperationType::Mock => "MOCK",
            CheckOperationType::Erc20 => "ERC20",
            CheckOperationType::Erc721 => "ERC721",
            CheckOperationType::Erc1155 => "ERC1155",
            CheckOperationType::IsEntitled => "ISENTITLED",
            CheckOperationType::EthBalance => "ETH_BALANCE",
        };
        f.write_str(name)
    }
}

impl fmt::Display for LogicalOperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalOperationType::None => "NONE",
            LogicalOperationType::And => "AND",
            LogicalOperationType::Or => "OR",
        };
        f.write_str(name)
    }
}

/// `tuple(uint256 threshold)`
#[derive(Debug, Clone, Default, PartialEq, Eq, EthAbiType, EthAbiCodec)]
pub struct ThresholdParams {
    pub threshold: U256,
}

/// `tuple(uint256 threshold, uint256 tokenId)`
#[derive(Debug, Clone, Default, PartialEq, Eq, EthAbiType, EthAbiCodec)]
pub struct Erc1155Params {
    pub threshold: U256,
    pub token_id: U256,
}

impl ThresholdParams {
    pub fn encode_params(&self) -> Bytes {
        encode_single(self.clone())
    }

    pub fn decode_params(data: &[u8]) -> Result<Self> {
        decode_single(data)
    }
}

impl Erc1155Params {
    pub fn encode_params(&self) -> Bytes {
        encode_single(self.clone())
    }

    pub fn decode_params(data: &[u8]) -> Result<Self> {
        decode_single(data)
    }
}

/// ABI encode `value` as a single argument, the way `abi.encode(value)` does
pub fn encode_single<T: Tokenizable>(value: T) -> Bytes {
    Bytes::from(ethers::abi::encode(&[value.into_token()]))
}

/// Inverse of [`encode_single`]
pub fn decode_single<T: Tokenizable + AbiType>(data: &[u8]) -> Result<T> {
    let mut tokens = ethers::abi::decode(&[T::param_type()], data)?;
    let token = tokens
        .pop()
        .ok_or_else(|| Error::decode("empty ABI payload"))?;
    T::from_token(token).map_err(|e| Error::decode(e.to_string()))
}

/// Rewrite V1 rule data into the V2 layout with ABI encoded params
pub fn convert_v1_to_v2(rule_data: &RuleData) -> Result<RuleDataV2> {
    let operations = rule_data
        .operations
        .iter()
        .map(|op| v2::Operation {
            op_type: op.op_type,
            index: op.index,
        })
        .collect();

    let logical_operations = rule_data
        .logical_operations
        .iter()
        .map(|op| v2::LogicalOperation {
            log_op_type: op.log_op_type,
            left_operation_index: op.left_operation_index,
            right_operation_index: op.right_operation_index,
        })
        .collect();

    let mut check_operations = Vec::with_capacity(rule_data.check_operations.len());
    for check in &rule_data.check_operations {
        let check_type = CheckOperationType::try_from(check.op_type)?;
        let params = match check_type {
            CheckOperationType::Mock
            | CheckOperationType::Erc20
            | CheckOperationType::Erc721
            | CheckOperationType::EthBalance => ThresholdParams {
                threshold: check.threshold,
            }
            .encode_params(),
            CheckOperationType::Erc1155 => {
                return Err(Error::validation("ERC1155 not supported by V1 rule data"));
            }
            CheckOperationType::IsEntitled | CheckOperationType::None => Bytes::new(),
        };
        check_operations.push(CheckOperationV2 {
            op_type: check.op_type,
            chain_id: check.chain_id,
            contract_address: check.contract_address,
            params,
        });
    }

    Ok(RuleDataV2 {
        operations,
        check_operations,
        logical_operations,
    })
}

/// Entitlement data as stored by an entitlement module
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Entitlement {
    Rule(RuleData),
    RuleV2(RuleDataV2),
    User(Vec<Address>),
}

impl Entitlement {
    /// Decode raw entitlement data by the module type that produced it
    pub fn from_raw(module_type: &str, data: &[u8]) -> Result<Self> {
        match module_type {
            MODULE_TYPE_RULE_ENTITLEMENT => Ok(Entitlement::Rule(decode_single(data)?)),
            MODULE_TYPE_RULE_ENTITLEMENT_V2 => Ok(Entitlement::RuleV2(decode_single(data)?)),
            MODULE_TYPE_USER_ENTITLEMENT => {
                let tokens = ethers::abi::decode(&[ParamType::Array(Box::new(ParamType::Address))], data)?;
                let addresses = match tokens.into_iter().next() {
                    Some(Token::Array(items)) => items.into_iter().filter_map(Token::into_address).collect(),
                    _ => return Err(Error::decode("malformed user entitlement data")),
                };
                Ok(Entitlement::User(addresses))
            }
            other => Err(Error::validation(format!("invalid entitlement type '{}'", other))),
        }
    }

    pub fn module_type(&self) -> &'static str {
        match self {
            Entitlement::Rule(_) => MODULE_TYPE_RULE_ENTITLEMENT,
            Entitlement::RuleV2(_) => MODULE_TYPE_RULE_ENTITLEMENT_V2,
            Entitlement::User(_) => MODULE_TYPE_USER_ENTITLEMENT,
        }
    }

    /// Rule data in the V2 layout. User entitlements carry no rules.
    pub fn into_rule_data_v2(self) -> Result<RuleDataV2> {
        match self {
            Entitlement::RuleV2(rule_data) => Ok(rule_data),
            Entitlement::Rule(rule_data) => convert_v1_to_v2(&rule_data),
            Entitlement::User(_) => Err(Error::not_found("no decoded rule entitlements for role")),
        }
    }
}
