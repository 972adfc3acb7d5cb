//! Receipt records returned by `eth_getUserOperationReceipt`.
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Outcome of an included user operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    /// Operation hash. Some relays omit it, in which case it is zero.
    #[serde(default)]
    pub user_op_hash: B256,
    /// Account that sent the operation.
    #[serde(default)]
    pub sender: Address,
    /// Whether the account's execution phase succeeded.
    pub success: bool,
    /// Wei charged for the operation.
    pub actual_gas_cost: U256,
    /// Gas consumed by the operation.
    pub actual_gas_used: U256,
    /// Revert reason or data reported by the relay, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The bundle transaction that included the operation.
    pub receipt: TransactionReceiptSummary,
}

/// The parts of the bundle transaction receipt callers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceiptSummary {
    /// Bundle transaction hash.
    pub transaction_hash: B256,
    /// Block the bundle landed in.
    #[serde(with = "alloy_serde::quantity")]
    pub block_number: u64,
    /// 1 when the bundle transaction itself succeeded.
    #[serde(with = "alloy_serde::quantity")]
    pub status: u64,
}

impl UserOperationReceipt {
    /// Bundle transaction hash.
    pub const fn transaction_hash(&self) -> B256 {
        self.receipt.transaction_hash
    }
}
