use ethers::contract::abigen;

abigen!(
    MockCustomEntitlement,
    "./abi/MockCustomEntitlement.json",
    derives(serde::Deserialize, serde::Serialize)
);
