//! Generic contract handle: address plus connection.
//!
//! Typed bindings cover the common path; [`BoundContract`] is what they are
//! built from and what the tooling uses when only the ABI is known at
//! runtime.

use std::sync::Arc;

use ethers::abi::{Abi, Token, Tokenize};
use ethers::contract::{Contract, ContractError, ContractFactory, EthEvent};
use ethers::providers::{Middleware, PubsubClient};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, Eip1559TransactionRequest, Filter, TransactionRequest, TxHash};
use tracing::{debug, info};

use river_common::{Error, Result};

use crate::call::{CallOpts, TransactOpts};
use crate::descriptor::ContractArtifact;
use crate::iterator::LogIterator;
use crate::subscription::{raw, Subscription};

/// Contract handle that encodes calls, decodes results and reads logs
#[derive(Debug)]
pub struct BoundContract<M> {
    address: Address,
    abi: Abi,
    client: Arc<M>,
}

impl<M> Clone for BoundContract<M> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            abi: self.abi.clone(),
            client: self.client.clone(),
        }
    }
}

impl<M: Middleware + 'static> BoundContract<M> {
    pub fn new(address: Address, abi: Abi, client: Arc<M>) -> Self {
        Self { address, abi, client }
    }

    /// Bind a bundled artifact at `address`
    pub fn from_artifact(artifact: &ContractArtifact, address: Address, client: Arc<M>) -> Result<Self> {
        Ok(Self::new(address, artifact.abi()?, client))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn client(&self) -> Arc<M> {
        self.client.clone()
    }

    /// Convert into a generated binding, e.g. `bound.typed::<WalletLink<M>>()`
    pub fn typed<C>(&self) -> C
    where
        C: From<Contract<M>>,
    {
        Contract::new(self.address, self.abi.clone(), self.client.clone()).into()
    }

    /// ABI-encode a call to `function`
    pub fn encode_call(&self, function: &str, args: &[Token]) -> std::result::Result<Bytes, ContractError<M>> {
        let function = self.abi.function(function)?;
        Ok(function.encode_input(args)?.into())
    }

    /// Decode the return data of `function`
    pub fn decode_output(&self, function: &str, data: &[u8]) -> std::result::Result<Vec<Token>, ContractError<M>> {
        let function = self.abi.function(function)?;
        Ok(function.decode_output(data)?)
    }

    /// `eth_call` a function by name with runtime tokens
    pub async fn call_raw(
        &self,
        function: &str,
        args: &[Token],
        opts: &CallOpts,
    ) -> std::result::Result<Vec<Token>, ContractError<M>> {
        let data = self.encode_call(function, args)?;
        let mut tx = TransactionRequest::new().to(self.address).data(data);
        if let Some(from) = opts.from {
            tx = tx.from(from);
        }
        let tx: TypedTransaction = tx.into();

        let output = self
            .client
            .call(&tx, opts.block.as_block_id())
            .await
            .map_err(ContractError::from_middleware_error)?;
        self.decode_output(function, &output)
    }

    /// Submit a transaction calling `function`, returning the hash immediately
    pub async fn transact_raw(
        &self,
        function: &str,
        args: &[Token],
        opts: &TransactOpts,
    ) -> std::result::Result<TxHash, ContractError<M>> {
        let data = self.encode_call(function, args)?;
        let mut tx: TypedTransaction = if opts.legacy {
            TransactionRequest::new().to(self.address).data(data).into()
        } else {
            Eip1559TransactionRequest::new().to(self.address).data(data).into()
        };
        if let Some(nonce) = opts.nonce {
            tx.set_nonce(nonce);
        }
        if let Some(gas) = opts.gas {
            tx.set_gas(gas);
        }
        if let Some(gas_price) = opts.gas_price {
            tx.set_gas_price(gas_price);
        }
        if let Some(value) = opts.value {
            tx.set_value(value);
        }

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(ContractError::from_middleware_error)?;
        let tx_hash = pending.tx_hash();
        debug!(function, tx_hash = ?tx_hash, "Transaction submitted");
        Ok(tx_hash)
    }

    /// Log filter for event `D` emitted by this contract
    pub fn event_filter<D: EthEvent>(&self) -> Filter {
        Filter::new().address(self.address).topic0(D::signature())
    }

    /// Historical logs for event `D` in `[from_block, to_block]`
    pub async fn filter_logs<D: EthEvent>(
        &self,
        from_block: u64,
        to_block: Option<u64>,
    ) -> std::result::Result<LogIterator<D>, ContractError<M>> {
        let to_block = to_block.map(BlockNumber::from).unwrap_or(BlockNumber::Latest);
        let filter = self.event_filter::<D>().from_block(from_block).to_block(to_block);
        let logs = self
            .client
            .get_logs(&filter)
            .await
            .map_err(ContractError::from_middleware_error)?;
        Ok(LogIterator::from_logs(logs))
    }

    /// Follow event `D` live over a pubsub connection
    pub fn watch_logs<D: EthEvent + 'static>(&self, from_block: Option<u64>) -> LogIterator<D>
    where
        M::Provider: PubsubClient,
    {
        let mut filter = self.event_filter::<D>();
        if let Some(from_block) = from_block {
            filter = filter.from_block(from_block);
        }
        LogIterator::from_subscription(|sink| Subscription::subscribe_logs(self.client.clone(), filter, raw, sink))
    }

    /// Deploy `artifact` with constructor `args` and bind the result
    pub async fn deploy<T: Tokenize>(artifact: &ContractArtifact, client: Arc<M>, args: T) -> Result<Self> {
        let abi = artifact.abi()?;
        let bytecode = artifact
            .bytecode()?
            .ok_or_else(|| Error::validation(format!("{} has no bytecode to deploy", artifact.name)))?;

        let factory = ContractFactory::new(abi.clone(), bytecode, client.clone());
        let contract = factory.deploy(args)?.send().await?;
        info!(contract = artifact.name, address = ?contract.address(), "Contract deployed");

        Ok(Self::new(contract.address(), abi, client))
    }
}
