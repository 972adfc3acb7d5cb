//! Client for a v0.7 bundler's `eth_*UserOperation*` methods.
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use keyrelay_core::{GasEstimate, RpcUserOperation, UserOperation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::{
    error::RpcCallError,
    poller::ReceiptSource,
    receipt::UserOperationReceipt,
    rpc::{JsonRpcClient, RpcErrorObject},
};

/// Substring the relay uses when a replacement does not pay enough.
pub const FEE_TOO_LOW_MESSAGE: &str = "replacement underpriced";

/// Fees the relay currently requires to replace an operation with the same nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeFloor {
    /// Max fee per gas of the operation already in the pool.
    #[serde(with = "alloy_serde::quantity")]
    pub current_max_fee: u128,
    /// Priority fee per gas of the operation already in the pool.
    #[serde(with = "alloy_serde::quantity")]
    pub current_max_priority_fee: u128,
}

/// Result of `eth_sendUserOperation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The relay accepted the operation under this hash.
    Accepted(B256),
    /// The relay holds an operation with the same nonce and wants more than `FeeFloor`.
    NeedsFeeBump(FeeFloor),
    /// Any other rejection.
    Rejected(RpcErrorObject),
}

impl SubmitOutcome {
    /// Classifies a relay error object.
    pub fn from_rejection(error: RpcErrorObject) -> Self {
        if error.message.to_lowercase().contains(FEE_TOO_LOW_MESSAGE) {
            let floor = error.data.clone().and_then(|data| serde_json::from_value::<FeeFloor>(data).ok());
            if let Some(floor) = floor {
                return Self::NeedsFeeBump(floor);
            }
            warn!(message = "fee-too-low rejection without a readable floor", error = %error.message);
        }
        Self::Rejected(error)
    }
}

/// Bundler JSON-RPC client bound to one EntryPoint.
#[derive(Debug)]
pub struct BundlerClient {
    rpc: JsonRpcClient,
    entry_point: Address,
}

impl BundlerClient {
    /// Client for the bundler at `url`.
    pub fn new(url: Url, entry_point: Address) -> Self {
        Self { rpc: JsonRpcClient::new(url), entry_point }
    }

    /// Client over an existing transport.
    pub const fn with_rpc(rpc: JsonRpcClient, entry_point: Address) -> Self {
        Self { rpc, entry_point }
    }

    /// EntryPoint sent with every request.
    pub const fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// `eth_estimateUserOperationGas`.
    pub async fn estimate_gas(&self, op: &UserOperation) -> Result<GasEstimate, RpcCallError> {
        self.rpc
            .request("eth_estimateUserOperationGas", (RpcUserOperation::from(op), self.entry_point))
            .await
    }

    /// `eth_sendUserOperation`. JSON-RPC rejections are folded into the outcome;
    /// only transport failures are errors.
    pub async fn send(&self, op: &UserOperation) -> Result<SubmitOutcome, RpcCallError> {
        let result: Result<B256, RpcCallError> = self
            .rpc
            .request("eth_sendUserOperation", (RpcUserOperation::from(op), self.entry_point))
            .await;

        match result {
            Ok(hash) => {
                info!(message = "operation accepted", sender = %op.sender, nonce = %op.nonce, user_op_hash = %hash);
                Ok(SubmitOutcome::Accepted(hash))
            }
            Err(RpcCallError::Rpc(error)) => Ok(SubmitOutcome::from_rejection(error)),
            Err(err) => Err(err),
        }
    }

    /// `eth_getUserOperationReceipt`; `None` while the operation is pending.
    pub async fn receipt(&self, hash: B256) -> Result<Option<UserOperationReceipt>, RpcCallError> {
        self.rpc.request("eth_getUserOperationReceipt", (hash,)).await
    }

    /// `eth_supportedEntryPoints`.
    pub async fn supported_entry_points(&self) -> Result<Vec<Address>, RpcCallError> {
        self.rpc.request("eth_supportedEntryPoints", serde_json::Value::Array(Vec::new())).await
    }
}

#[async_trait]
impl ReceiptSource for BundlerClient {
    async fn fetch_receipt(&self, hash: B256) -> Result<Option<UserOperationReceipt>, RpcCallError> {
        self.receipt(hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejection(message: &str, data: Option<serde_json::Value>) -> RpcErrorObject {
        RpcErrorObject { code: -32602, message: message.to_string(), data }
    }

    #[test]
    fn fee_too_low_with_floor_needs_bump() {
        let outcome = SubmitOutcome::from_rejection(rejection(
            "Replacement Underpriced",
            Some(json!({"currentMaxFee": "0x64", "currentMaxPriorityFee": "0xa"})),
        ));
        assert_eq!(
            outcome,
            SubmitOutcome::NeedsFeeBump(FeeFloor { current_max_fee: 100, current_max_priority_fee: 10 })
        );
    }

    #[test]
    fn fee_too_low_without_floor_is_rejected() {
        let outcome = SubmitOutcome::from_rejection(rejection("replacement underpriced", None));
        assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
    }

    #[test]
    fn other_errors_are_rejected() {
        let outcome = SubmitOutcome::from_rejection(rejection(
            "AA21 didn't pay prefund",
            Some(json!({"currentMaxFee": "0x64", "currentMaxPriorityFee": "0xa"})),
        ));
        let SubmitOutcome::Rejected(err) = outcome else { panic!("expected rejection") };
        assert!(err.message.contains("AA21"));
    }
}
