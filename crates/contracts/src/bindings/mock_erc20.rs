use ethers::contract::abigen;

abigen!(
    MockErc20,
    "./abi/MockErc20.json",
    derives(serde::Deserialize, serde::Serialize)
);
