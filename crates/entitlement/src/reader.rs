//! Chain reads used by check operations

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, U256};
use tracing::debug;

use river_common::{Error, Result};
use river_contracts::bindings::{Erc1155, ICustomEntitlement, MockErc20, MockErc721};
use river_contracts::call::{self, CallOpts};
use river_core::ChainConfig;

/// Read access to the chains rules may reference
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn erc20_balance(&self, chain_id: u64, token: Address, wallet: Address) -> Result<U256>;

    async fn erc721_balance(&self, chain_id: u64, token: Address, wallet: Address) -> Result<U256>;

    async fn erc1155_balance(&self, chain_id: u64, token: Address, wallet: Address, token_id: U256) -> Result<U256>;

    async fn is_entitled(&self, chain_id: u64, contract: Address, wallet: Address) -> Result<bool>;

    async fn native_balance(&self, chain_id: u64, wallet: Address) -> Result<U256>;

    /// Chains whose native token is ether
    fn ether_based_chains(&self) -> Vec<u64>;
}

/// [`ChainReader`] over one client per configured chain
pub struct ProviderChainReader<M> {
    clients: HashMap<u64, Arc<M>>,
    ether_based: Vec<u64>,
}

impl ProviderChainReader<Provider<Http>> {
    /// Connect an HTTP client to every chain in `chains`
    pub fn from_config(chains: &[ChainConfig]) -> Result<Self> {
        let mut clients = HashMap::with_capacity(chains.len());
        let mut ether_based = Vec::new();
        for chain in chains {
            let provider = Provider::<Http>::try_from(chain.rpc_url.as_str())
                .map_err(|e| Error::config(format!("Invalid RPC URL for chain {}: {}", chain.chain_id, e)))?;
            clients.insert(chain.chain_id, Arc::new(provider));
            if chain.ether_based {
                ether_based.push(chain.chain_id);
            }
            debug!(chain_id = chain.chain_id, name = %chain.name, "Entitlement chain client ready");
        }
        Ok(Self { clients, ether_based })
    }
}

impl<M: Middleware + 'static> ProviderChainReader<M> {
    pub fn new(clients: HashMap<u64, Arc<M>>, ether_based: Vec<u64>) -> Self {
        Self { clients, ether_based }
    }

    pub fn client(&self, chain_id: u64) -> Result<Arc<M>> {
        self.clients
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Chain ID {} not found", chain_id)))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainReader for ProviderChainReader<M> {
    async fn erc20_balance(&self, chain_id: u64, token: Address, wallet: Address) -> Result<U256> {
        let contract = MockErc20::new(token, self.client(chain_id)?);
        Ok(call::call(contract.balance_of(wallet), &CallOpts::default()).await?)
    }

    async fn erc721_balance(&self, chain_id: u64, token: Address, wallet: Address) -> Result<U256> {
        let contract = MockErc721::new(token, self.client(chain_id)?);
        Ok(call::call(contract.balance_of(wallet), &CallOpts::default()).await?)
    }

    async fn erc1155_balance(&self, chain_id: u64, token: Address, wallet: Address, token_id: U256) -> Result<U256> {
        let contract = Erc1155::new(token, self.client(chain_id)?);
        Ok(call::call(contract.balance_of(wallet, token_id), &CallOpts::default()).await?)
    }

    async fn is_entitled(&self, chain_id: u64, contract: Address, wallet: Address) -> Result<bool> {
        let contract = ICustomEntitlement::new(contract, self.client(chain_id)?);
        Ok(call::call(contract.is_entitled(vec![wallet]), &CallOpts::default()).await?)
    }

    async fn native_balance(&self, chain_id: u64, wallet: Address) -> Result<U256> {
        let client = self.client(chain_id)?;
        client
            .get_balance(wallet, None)
            .await
            .map_err(|e| Error::contract(format!("Failed to get balance on chain {}: {}", chain_id, e)))
    }

    fn ether_based_chains(&self) -> Vec<u64> {
        self.ether_based.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::AbiEncode;
    use ethers::providers::MockProvider;
    use ethers::types::Bytes;

    fn reader() -> (ProviderChainReader<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let clients = HashMap::from([(10u64, Arc::new(provider))]);
        (ProviderChainReader::new(clients, vec![10]), mock)
    }

    #[tokio::test]
    async fn test_erc20_balance() {
        let (reader, mock) = reader();
        mock.push::<Bytes, _>(Bytes::from(U256::from(250).encode())).unwrap();
        let balance = reader
            .erc20_balance(10, Address::repeat_byte(1), Address::repeat_byte(2))
            .await
            .unwrap();
        assert_eq!(balance, U256::from(250));
    }

    #[tokio::test]
    async fn test_is_entitled() {
        let (reader, mock) = reader();
        mock.push::<Bytes, _>(Bytes::from(true.encode())).unwrap();
        assert!(reader
            .is_entitled(10, Address::repeat_byte(1), Address::repeat_byte(2))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_native_balance() {
        let (reader, mock) = reader();
        mock.push(U256::from(7)).unwrap();
        assert_eq!(reader.native_balance(10, Address::repeat_byte(2)).await.unwrap(), U256::from(7));
        assert_eq!(reader.ether_based_chains(), vec![10]);
    }

    #[tokio::test]
    async fn test_unknown_chain() {
        let (reader, _mock) = reader();
        let err = reader
            .erc721_balance(1, Address::repeat_byte(1), Address::repeat_byte(2))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not found: Chain ID 1 not found");
    }

    #[test]
    fn test_from_config() {
        let chains = vec![
            ChainConfig { chain_id: 1, ether_based: true, ..Default::default() },
            ChainConfig { chain_id: 137, ether_based: false, ..Default::default() },
        ];
        let reader = ProviderChainReader::from_config(&chains).unwrap();
        assert_eq!(reader.chain_ids(), vec![1, 137]);
        assert_eq!(reader.ether_based_chains(), vec![1]);
    }
}
