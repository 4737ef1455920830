//! Entitlement checker with node and operator registration, used in local deployments.

use ethers::contract::abigen;

abigen!(
    MockEntitlementChecker,
    "./abi/MockEntitlementChecker.json",
    derives(serde::Deserialize, serde::Serialize)
);
