use ethers::contract::abigen;

abigen!(
    MockErc721,
    "./abi/MockErc721.json",
    derives(serde::Deserialize, serde::Serialize)
);
