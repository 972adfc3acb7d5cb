//! Paymaster sponsorship over `pm_sponsorUserOperation`.
use alloy_primitives::{Address, Bytes};
use keyrelay_core::{PaymasterPayload, RpcUserOperation, UserOperation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{error::RpcCallError, rpc::JsonRpcClient};

/// Sponsor fields returned by the paymaster. Gas quantities present here are
/// authoritative and replace the client's own estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorResult {
    /// Paymaster contract.
    pub paymaster: Address,
    /// Opaque paymaster data, typically carrying the sponsor's signature.
    pub paymaster_data: Bytes,
    /// Gas for the paymaster's validation.
    #[serde(with = "alloy_serde::quantity")]
    pub paymaster_verification_gas_limit: u128,
    /// Gas for the paymaster's post-op hook.
    #[serde(with = "alloy_serde::quantity")]
    pub paymaster_post_op_gas_limit: u128,
    /// Overrides the estimated pre-verification gas.
    #[serde(default, with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<u128>,
    /// Overrides the estimated verification gas.
    #[serde(default, with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<u128>,
    /// Overrides the estimated call gas.
    #[serde(default, with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<u128>,
}

impl SponsorResult {
    /// The `paymasterAndData` components for the operation.
    pub fn payload(&self) -> PaymasterPayload {
        PaymasterPayload {
            paymaster: self.paymaster,
            verification_gas_limit: self.paymaster_verification_gas_limit,
            post_op_gas_limit: self.paymaster_post_op_gas_limit,
            data: self.paymaster_data.clone(),
        }
    }
}

/// Paymaster JSON-RPC client bound to one EntryPoint.
#[derive(Debug)]
pub struct PaymasterClient {
    rpc: JsonRpcClient,
    entry_point: Address,
}

impl PaymasterClient {
    /// Client for the paymaster at `url`.
    pub fn new(url: Url, entry_point: Address) -> Self {
        Self { rpc: JsonRpcClient::new(url), entry_point }
    }

    /// Requests sponsorship for `op`. Fees must already be set: the sponsor signs over them.
    pub async fn sponsor(&self, op: &UserOperation) -> Result<SponsorResult, RpcCallError> {
        let result: SponsorResult = self
            .rpc
            .request("pm_sponsorUserOperation", (RpcUserOperation::from(op), self.entry_point))
            .await?;
        debug!(message = "sponsorship granted", sender = %op.sender, paymaster = %result.paymaster);
        Ok(result)
    }
}
