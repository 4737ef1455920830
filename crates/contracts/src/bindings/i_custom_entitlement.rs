//! Custom entitlement interface: a single `isEntitled(address[])` view.

use ethers::contract::abigen;

abigen!(
    ICustomEntitlement,
    "./abi/ICustomEntitlement.json",
    derives(serde::Deserialize, serde::Serialize)
);
