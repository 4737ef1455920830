//! Stream, node, operator and configuration facets of the River registry behind one address.

use ethers::contract::abigen;

abigen!(
    MockRiverRegistry,
    "./abi/MockRiverRegistry.json",
    derives(serde::Deserialize, serde::Serialize)
);
