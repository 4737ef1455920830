//! Entitlement-gated contract client: fetches the rule data for a pending
//! check and posts this node's vote.

use std::sync::Arc;

use ethers::abi::Tokenizable;
use ethers::providers::Middleware;
use ethers::types::{Address, TxHash, H256, U256};
use tracing::{debug, info};

use river_common::{Error, Result};
use river_contracts::bindings::rule_entitlement::RuleData;
use river_contracts::bindings::rule_entitlement_v2::RuleDataV2;
use river_contracts::bindings::IEntitlementGated;
use river_contracts::call::{self, CallOpts, TransactOpts};
use river_contracts::{DecodedEvmError, EvmErrorDecoder, WalletLinker};

use crate::evaluator::Evaluator;
use crate::types::{convert_v1_to_v2, NodeVoteStatus};

/// Reverts meaning the vote is no longer needed
pub const IGNORED_POST_ERRORS: [&str; 3] = [
    "EntitlementGated_TransactionNotRegistered",
    "EntitlementGated_NodeAlreadyVoted",
    "EntitlementGated_TransactionCheckAlreadyCompleted",
];

/// Whether a revert only says the vote arrived too late or twice
pub fn is_stale_vote(decoded: &DecodedEvmError) -> bool {
    IGNORED_POST_ERRORS.iter().any(|name| decoded.is_custom(name))
}

#[derive(Debug, Clone)]
pub struct EntitlementGated<M> {
    contract: IEntitlementGated<M>,
    decoder: EvmErrorDecoder,
    transact_opts: TransactOpts,
}

impl<M: Middleware + 'static> EntitlementGated<M> {
    pub fn new(address: Address, client: Arc<M>) -> Result<Self> {
        Ok(Self {
            contract: IEntitlementGated::new(address, client),
            decoder: EvmErrorDecoder::with_bundled_errors()?,
            transact_opts: TransactOpts::default(),
        })
    }

    pub fn with_transact_opts(mut self, opts: TransactOpts) -> Self {
        self.transact_opts = opts;
        self
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// Rule data for a pending check, converted to the V2 layout
    pub async fn rule_data(&self, transaction_id: [u8; 32], role_id: U256) -> Result<RuleDataV2> {
        let raw = call::call(self.contract.get_rule_data(transaction_id, role_id), &CallOpts::default())
            .await
            .map_err(|e| self.decoder.explain(Error::from(e)))?;
        // Same ABI layout as the rule entitlement's own RuleData
        let rule_data = RuleData::from_token(raw.into_token()).map_err(|e| Error::decode(e.to_string()))?;
        convert_v1_to_v2(&rule_data)
    }

    /// Post this node's vote. Returns `None` when the contract no longer
    /// accepts votes for the transaction.
    pub async fn post_result(
        &self,
        transaction_id: [u8; 32],
        role_id: U256,
        status: NodeVoteStatus,
    ) -> Result<Option<TxHash>> {
        let call = self
            .contract
            .post_entitlement_check_result(transaction_id, role_id, status.into());
        match call::send(call, &self.transact_opts).await {
            Ok(tx_hash) => {
                info!(txid = ?H256::from(transaction_id), role_id = %role_id, ?status, tx_hash = ?tx_hash, "Posted entitlement check result");
                Ok(Some(tx_hash))
            }
            Err(e) => {
                let err = Error::from(e);
                if let Ok(decoded) = self.decoder.decode_error(&err) {
                    if is_stale_vote(&decoded) {
                        debug!(txid = ?H256::from(transaction_id), error = decoded.name(), "Unable to submit entitlement check outcome");
                        return Ok(None);
                    }
                }
                Err(self.decoder.explain(err))
            }
        }
    }
}

/// Evaluate a requested check for `caller` across its linked wallets and
/// post the outcome. Returns the vote and the transaction, if one was sent.
pub async fn process_check_request<M: Middleware + 'static>(
    linker: &WalletLinker<M>,
    gated: &EntitlementGated<M>,
    evaluator: &Evaluator,
    caller: Address,
    transaction_id: [u8; 32],
    role_id: U256,
) -> Result<(NodeVoteStatus, Option<TxHash>)> {
    let wallets = linker.get_linked_wallets(caller).await?;
    let rule_data = gated.rule_data(transaction_id, role_id).await?;
    let passed = evaluator.evaluate_rule_data(&wallets, &rule_data).await?;
    let status = NodeVoteStatus::from_result(passed);
    debug!(caller = ?caller, wallets = wallets.len(), ?status, "Evaluated entitlement check request");
    let tx_hash = gated.post_result(transaction_id, role_id, status).await?;
    Ok((status, tx_hash))
}
