//! Call and transaction options applied to generated contract calls.
//!
//! Reads go through [`call`], which executes `eth_call` at the requested
//! block and hands back the decoded value or the untouched contract error.
//! Writes go through [`send`], which submits and returns the transaction
//! hash without waiting for inclusion; [`wait_for_receipt`] is the separate
//! step for callers that need the outcome.

use std::borrow::Borrow;
use std::time::Duration;

use ethers::abi::Detokenize;
use ethers::contract::{ContractError, FunctionCall};
use ethers::providers::Middleware;
use ethers::types::{Address, TransactionReceipt, TxHash, U256};
use tracing::debug;

use river_common::{BlockNum, Error, Result};

/// Options for read-only calls
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOpts {
    /// Block to execute at, latest when zero
    pub block: BlockNum,
    /// Caller address seen by the contract
    pub from: Option<Address>,
}

impl CallOpts {
    pub fn at(block: impl Into<BlockNum>) -> Self {
        Self {
            block: block.into(),
            from: None,
        }
    }

    pub fn apply<B, M, D>(&self, mut call: FunctionCall<B, M, D>) -> FunctionCall<B, M, D>
    where
        B: Borrow<M>,
        M: Middleware,
        D: Detokenize,
    {
        if let Some(block) = self.block.as_block_id() {
            call = call.block(block);
        }
        if let Some(from) = self.from {
            call = call.from(from);
        }
        call
    }
}

/// Options for state-changing calls. Unset fields are filled by the middleware.
#[derive(Debug, Clone, Default)]
pub struct TransactOpts {
    pub nonce: Option<U256>,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
    pub value: Option<U256>,
    /// Submit a legacy (pre EIP-1559) transaction
    pub legacy: bool,
}

impl TransactOpts {
    pub fn apply<B, M, D>(&self, mut call: FunctionCall<B, M, D>) -> FunctionCall<B, M, D>
    where
        B: Borrow<M>,
        M: Middleware,
        D: Detokenize,
    {
        if self.legacy {
            call = call.legacy();
        }
        if let Some(nonce) = self.nonce {
            call = call.nonce(nonce);
        }
        if let Some(gas) = self.gas {
            call = call.gas(gas);
        }
        if let Some(gas_price) = self.gas_price {
            call = call.gas_price(gas_price);
        }
        if let Some(value) = self.value {
            call = call.value(value);
        }
        call
    }
}

/// Execute a view call. Errors are returned exactly as the binding reports them.
pub async fn call<B, M, D>(call: FunctionCall<B, M, D>, opts: &CallOpts) -> std::result::Result<D, ContractError<M>>
where
    B: Borrow<M>,
    M: Middleware,
    D: Detokenize,
{
    opts.apply(call).call().await
}

/// Submit a transaction and return its hash without waiting for it to be mined
pub async fn send<B, M, D>(call: FunctionCall<B, M, D>, opts: &TransactOpts) -> std::result::Result<TxHash, ContractError<M>>
where
    B: Borrow<M>,
    M: Middleware,
    D: Detokenize,
{
    let call = opts.apply(call);
    let pending = call.send().await?;
    let tx_hash = pending.tx_hash();
    debug!(tx_hash = ?tx_hash, "Transaction submitted");
    Ok(tx_hash)
}

/// Poll for a receipt until it appears or `timeout` elapses
pub async fn wait_for_receipt<M: Middleware>(
    client: &M,
    tx_hash: TxHash,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<TransactionReceipt> {
    let poll = async {
        loop {
            let receipt = client
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| Error::transaction(format!("Failed to get receipt for {:?}: {}", tx_hash, e)))?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| Error::transaction(format!("Timed out waiting for receipt of {:?}", tx_hash)))?
}

/// Error unless the receipt reports success
pub fn ensure_success(receipt: &TransactionReceipt) -> Result<()> {
    match receipt.status {
        Some(status) if status.as_u64() == 1 => Ok(()),
        _ => Err(Error::transaction(format!(
            "transaction failed: {:?}",
            receipt.transaction_hash
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U64;

    #[test]
    fn test_ensure_success() {
        let mut receipt = TransactionReceipt {
            status: Some(U64::from(1)),
            ..Default::default()
        };
        assert!(ensure_success(&receipt).is_ok());

        receipt.status = Some(U64::zero());
        let err = ensure_success(&receipt).unwrap_err();
        assert!(err.to_string().contains("transaction failed"));

        receipt.status = None;
        assert!(ensure_success(&receipt).is_err());
    }

    #[test]
    fn test_call_opts_at() {
        let opts = CallOpts::at(12u64);
        assert_eq!(opts.block, BlockNum(12));
        assert!(opts.from.is_none());
        assert!(CallOpts::default().block.is_latest());
    }
}
