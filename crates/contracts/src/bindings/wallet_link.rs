//! Wallet to root key linking.

use ethers::contract::abigen;

abigen!(
    WalletLink,
    "./abi/WalletLink.json",
    derives(serde::Deserialize, serde::Serialize)
);
