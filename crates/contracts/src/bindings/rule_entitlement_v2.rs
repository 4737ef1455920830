//! Rule entitlement module with parameterised check operations.

use ethers::contract::abigen;

abigen!(
    RuleEntitlementV2,
    "./abi/RuleEntitlementV2.json",
    derives(serde::Deserialize, serde::Serialize)
);
