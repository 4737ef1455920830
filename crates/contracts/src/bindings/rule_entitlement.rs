//! Rule entitlement module, version 1 rule data.

use ethers::contract::abigen;

abigen!(
    RuleEntitlement,
    "./abi/RuleEntitlement.json",
    derives(serde::Deserialize, serde::Serialize)
);
