//! Links between wallets and the root key that owns them.

use std::sync::Arc;

use ethers::abi::Token;
use ethers::providers::Middleware;
use ethers::signers::Signer;
use ethers::types::{Address, Bytes, TxHash, H256, U256};
use tracing::{debug, info};

use river_common::{BlockNum, Error, Result};

use crate::bindings::wallet_link::LinkedWallet;
use crate::bindings::WalletLink;
use crate::call::{self, CallOpts, TransactOpts};
use crate::descriptor::keccak;

/// `keccak256(abi.encode(address, uint256 nonce))`, the payload both sides sign
pub fn link_message_hash(address: Address, nonce: U256) -> H256 {
    let packed = ethers::abi::encode(&[Token::Address(address), Token::Uint(nonce)]);
    H256::from(keccak(&packed))
}

/// EIP-191 signature of the link payload for `address` at `nonce`
pub async fn sign_link<S: Signer>(signer: &S, address: Address, nonce: U256) -> Result<Bytes> {
    let hash = link_message_hash(address, nonce);
    let signature = signer
        .sign_message(hash.as_bytes())
        .await
        .map_err(|e| Error::validation(format!("Failed to sign link message: {}", e)))?;
    Ok(Bytes::from(signature.to_vec()))
}

#[derive(Debug, Clone)]
pub struct WalletLinker<M> {
    contract: WalletLink<M>,
    transact_opts: TransactOpts,
}

impl<M: Middleware + 'static> WalletLinker<M> {
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            contract: WalletLink::new(address, client),
            transact_opts: TransactOpts::default(),
        }
    }

    pub fn with_transact_opts(mut self, opts: TransactOpts) -> Self {
        self.transact_opts = opts;
        self
    }

    pub fn contract(&self) -> &WalletLink<M> {
        &self.contract
    }

    pub async fn latest_nonce(&self, root_key: Address) -> Result<U256> {
        Ok(call::call(self.contract.get_latest_nonce_for_root_key(root_key), &CallOpts::default()).await?)
    }

    /// Link `wallet` to `root_key`. Both sign the other's address with the
    /// root key's current nonce; the transaction must come from the root key.
    pub async fn link_wallet_to_root_key<W, R>(&self, wallet: &W, root_key: &R) -> Result<TxHash>
    where
        W: Signer,
        R: Signer,
    {
        let wallet_address = wallet.address();
        let root_address = root_key.address();
        let nonce = self.latest_nonce(root_address).await?;
        debug!(wallet = ?wallet_address, root_key = ?root_address, nonce = %nonce, "Linking wallet");

        let root_data = LinkedWallet {
            addr: root_address,
            signature: sign_link(root_key, wallet_address, nonce).await?,
            message: String::new(),
        };
        let wallet_data = LinkedWallet {
            addr: wallet_address,
            signature: sign_link(wallet, root_address, nonce).await?,
            message: String::new(),
        };

        let call = self.contract.link_wallet_to_root_key(wallet_data, root_data, nonce);
        let tx_hash = call::send(call, &self.transact_opts).await?;
        info!(wallet = ?wallet_address, root_key = ?root_address, tx_hash = ?tx_hash, "Wallet link submitted");
        Ok(tx_hash)
    }

    pub async fn get_root_key_for_wallet(&self, wallet: Address, block: BlockNum) -> Result<Address> {
        Ok(call::call(self.contract.get_root_key_for_wallet(wallet), &CallOpts::at(block)).await?)
    }

    pub async fn get_wallets_by_root_key(&self, root_key: Address, block: BlockNum) -> Result<Vec<Address>> {
        Ok(call::call(self.contract.get_wallets_by_root_key(root_key), &CallOpts::at(block)).await?)
    }

    /// Every wallet linked with `wallet` through its root key, including the
    /// root key itself. An unlinked wallet yields just itself.
    pub async fn get_linked_wallets(&self, wallet: Address) -> Result<Vec<Address>> {
        let root_key = self.get_root_key_for_wallet(wallet, BlockNum::LATEST).await?;
        if root_key.is_zero() {
            debug!(wallet = ?wallet, "Wallet has no root key");
            return Ok(vec![wallet]);
        }

        let mut wallets = self.get_wallets_by_root_key(root_key, BlockNum::LATEST).await?;
        if wallets.is_empty() {
            return Ok(vec![wallet]);
        }
        wallets.push(root_key);
        Ok(wallets)
    }
}
