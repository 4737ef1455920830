//! Rule evaluation against a set of linked wallets.
//!
//! Both operands of a logical operation run concurrently. The first operand
//! to settle with a deciding value (false or an error for AND, true or an
//! error for OR) drops its sibling, which cancels any chain reads or mock
//! delays still in flight. A failed operand counts as false; only a failing
//! check at the root surfaces its error.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, U256};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use river_common::{Error, Result};
use river_contracts::bindings::rule_entitlement_v2::RuleDataV2;

use crate::reader::ChainReader;
use crate::tree::{build_operation_tree, CheckOperation, CheckParams, Operation};
use crate::types::{CheckOperationType, LogicalOperationType};

#[derive(Clone)]
pub struct Evaluator {
    reader: Arc<dyn ChainReader>,
}

impl Evaluator {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Build the operation tree for `rule_data` and evaluate it
    pub async fn evaluate_rule_data(&self, wallets: &[Address], rule_data: &RuleDataV2) -> Result<bool> {
        let tree = build_operation_tree(rule_data)?;
        debug!(checks = tree.check_count(), wallets = wallets.len(), "Evaluating rule");
        self.evaluate(&tree, wallets).await
    }

    pub fn evaluate<'a>(&'a self, op: &'a Operation, wallets: &'a [Address]) -> BoxFuture<'a, Result<bool>> {
        async move {
            match op {
                Operation::Check(check) => self.evaluate_check(check, wallets).await,
                Operation::Logical { op: kind, left, right } => {
                    self.evaluate_logical(*kind, left, right, wallets).await
                }
            }
        }
        .boxed()
    }

    async fn evaluate_logical(
        &self,
        kind: LogicalOperationType,
        left: &Operation,
        right: &Operation,
        wallets: &[Address],
    ) -> Result<bool> {
        let decides = |result: &Result<bool>| match kind {
            LogicalOperationType::And => !matches!(result, Ok(true)),
            _ => !matches!(result, Ok(false)),
        };

        let mut left = self.evaluate(left, wallets);
        let mut right = self.evaluate(right, wallets);

        // Returning early drops the pending sibling, which cancels it
        tokio::select! {
            result = &mut left => {
                if decides(&result) {
                    return Ok(settle(kind, result));
                }
                Ok(settle(kind, right.await))
            }
            result = &mut right => {
                if decides(&result) {
                    return Ok(settle(kind, result));
                }
                Ok(settle(kind, left.await))
            }
        }
    }

    /// Validate then run a single check
    pub async fn evaluate_check(&self, op: &CheckOperation, wallets: &[Address]) -> Result<bool> {
        validate_check(op)?;
        match op.check_type {
            CheckOperationType::Mock => evaluate_mock(op).await,
            CheckOperationType::Erc20 => {
                let chain_id = chain_id(op)?;
                self.accumulate(op, wallets, |wallet| self.reader.erc20_balance(chain_id, op.contract_address, wallet))
                    .await
            }
            CheckOperationType::Erc721 => {
                let chain_id = chain_id(op)?;
                self.accumulate(op, wallets, |wallet| self.reader.erc721_balance(chain_id, op.contract_address, wallet))
                    .await
            }
            CheckOperationType::Erc1155 => {
                let chain_id = chain_id(op)?;
                let token_id = match op.params {
                    CheckParams::Erc1155 { token_id, .. } => token_id,
                    _ => return Err(Error::validation("ERC1155 check without token id")),
                };
                self.accumulate(op, wallets, |wallet| {
                    self.reader.erc1155_balance(chain_id, op.contract_address, wallet, token_id)
                })
                .await
            }
            CheckOperationType::IsEntitled => {
                let chain_id = chain_id(op)?;
                for wallet in wallets {
                    if self.reader.is_entitled(chain_id, op.contract_address, *wallet).await? {
                        debug!(wallet = ?wallet, contract = ?op.contract_address, "Wallet is entitled");
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            CheckOperationType::EthBalance => self.evaluate_eth_balance(op, wallets).await,
            CheckOperationType::None => Err(Error::validation("unknown operation")),
        }
    }

    /// Sum balances over `wallets`, passing once the total reaches the threshold
    async fn accumulate<F, Fut>(&self, op: &CheckOperation, wallets: &[Address], mut balance_of: F) -> Result<bool>
    where
        F: FnMut(Address) -> Fut,
        Fut: std::future::Future<Output = Result<U256>>,
    {
        let threshold = op.threshold();
        let mut total = U256::zero();
        for wallet in wallets {
            let balance = balance_of(*wallet).await.map_err(|e| {
                warn!(error = %e, wallet = ?wallet, contract = ?op.contract_address, check = %op.check_type, "Failed to retrieve balance");
                e
            })?;
            total = total.saturating_add(balance);
            debug!(
                check = %op.check_type,
                balance = %balance,
                total = %total,
                threshold = %threshold,
                chain_id = %op.chain_id,
                "Retrieved balance"
            );
            if total >= threshold {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn evaluate_eth_balance(&self, op: &CheckOperation, wallets: &[Address]) -> Result<bool> {
        let threshold = op.threshold();
        let mut total = U256::zero();
        for chain_id in self.reader.ether_based_chains() {
            for wallet in wallets {
                total = total.saturating_add(self.reader.native_balance(chain_id, *wallet).await?);
                if total >= threshold {
                    return Ok(true);
                }
            }
        }
        debug!(total = %total, threshold = %threshold, "Insufficient native balance");
        Ok(false)
    }
}

/// A failed operand counts as false
fn settle(kind: LogicalOperationType, result: Result<bool>) -> bool {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, op = %kind, "Operand failed");
            false
        }
    }
}

fn chain_id(op: &CheckOperation) -> Result<u64> {
    if op.chain_id > U256::from(u64::MAX) {
        return Err(Error::not_found(format!("Chain ID {} not found", op.chain_id)));
    }
    Ok(op.chain_id.as_u64())
}

/// Reject checks missing the fields their type needs
pub fn validate_check(op: &CheckOperation) -> Result<()> {
    let needs_contract = |op: &CheckOperation| -> Result<()> {
        if op.chain_id.is_zero() {
            return Err(Error::validation(format!("{} check requires a chain id", op.check_type)));
        }
        if op.contract_address.is_zero() {
            return Err(Error::validation(format!("{} check requires a contract address", op.check_type)));
        }
        Ok(())
    };
    let needs_threshold = |op: &CheckOperation| -> Result<()> {
        if op.threshold().is_zero() {
            return Err(Error::validation(format!("{} check requires a threshold greater than zero", op.check_type)));
        }
        Ok(())
    };

    match op.check_type {
        CheckOperationType::Erc20 | CheckOperationType::Erc721 | CheckOperationType::Erc1155 => {
            needs_contract(op)?;
            needs_threshold(op)
        }
        CheckOperationType::IsEntitled => needs_contract(op),
        CheckOperationType::EthBalance => needs_threshold(op),
        CheckOperationType::Mock | CheckOperationType::None => Ok(()),
    }
}

/// Sleep for `threshold` milliseconds, then pass when the chain id is set
async fn evaluate_mock(op: &CheckOperation) -> Result<bool> {
    let threshold = op.threshold();
    let delay = if threshold > U256::from(u64::MAX) {
        u64::MAX
    } else {
        threshold.as_u64()
    };
    tokio::time::sleep(Duration::from_millis(delay)).await;
    Ok(!op.chain_id.is_zero())
}
