//! Space entitlement module interface.

use ethers::contract::abigen;

abigen!(
    IEntitlement,
    "./abi/IEntitlement.json",
    derives(serde::Deserialize, serde::Serialize)
);
