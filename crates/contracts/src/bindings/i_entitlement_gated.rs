//! Entitlement-gated contract: rule data lookup and result posting.

use ethers::contract::abigen;

abigen!(
    IEntitlementGated,
    "./abi/IEntitlementGated.json",
    derives(serde::Deserialize, serde::Serialize)
);
