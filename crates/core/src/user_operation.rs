//! The packed user operation record and its JSON wire form.
use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{
    abi::pack_u128_pair,
    error::{CoreError, Result},
};

/// Factory call used to deploy the account on its first operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPayload {
    /// Factory contract.
    pub factory: Address,
    /// Calldata sent to the factory (selector and constructor arguments).
    pub factory_data: Bytes,
}

/// Sponsor fields returned by a paymaster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterPayload {
    /// Paymaster contract.
    pub paymaster: Address,
    /// Gas reserved for the paymaster's validation.
    pub verification_gas_limit: u128,
    /// Gas reserved for the paymaster's post-op hook.
    pub post_op_gas_limit: u128,
    /// Opaque sponsor data.
    pub data: Bytes,
}

/// Fee-market quantities of an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fees {
    /// Maximum total fee per gas.
    #[serde(with = "alloy_serde::quantity")]
    pub max_fee_per_gas: u128,
    /// Maximum priority fee per gas.
    #[serde(with = "alloy_serde::quantity")]
    pub max_priority_fee_per_gas: u128,
}

/// Gas quantities returned by `eth_estimateUserOperationGas`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Gas charged for the bundle overhead of this operation.
    #[serde(with = "alloy_serde::quantity")]
    pub pre_verification_gas: u128,
    /// Gas for account (and factory) validation.
    #[serde(with = "alloy_serde::quantity")]
    pub verification_gas_limit: u128,
    /// Gas for the account's execution phase.
    #[serde(with = "alloy_serde::quantity")]
    pub call_gas_limit: u128,
}

/// A user operation in its unpacked, in-memory form.
///
/// Gas and fee quantities are `u128` so that the two 32-byte packed fields
/// (`accountGasLimits` and `gasFees`) can always be formed without truncation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserOperation {
    /// Account address.
    pub sender: Address,
    /// Key (upper 192 bits) and sequence (lower 64 bits) issued by the EntryPoint.
    pub nonce: U256,
    /// Present only for the first operation of an undeployed account.
    pub deployment: Option<DeploymentPayload>,
    /// Calldata the EntryPoint forwards to the account.
    pub call_data: Bytes,
    /// Execution gas.
    pub call_gas_limit: u128,
    /// Validation gas.
    pub verification_gas_limit: u128,
    /// Bundle overhead gas.
    pub pre_verification_gas: u128,
    /// Maximum total fee per gas.
    pub max_fee_per_gas: u128,
    /// Maximum priority fee per gas.
    pub max_priority_fee_per_gas: u128,
    /// Optional sponsor.
    pub paymaster: Option<PaymasterPayload>,
    /// Curve-dependent signature over the operation hash.
    pub signature: Bytes,
}

impl UserOperation {
    /// `factory ‖ factoryData`, or empty when the account is already deployed.
    pub fn init_code(&self) -> Bytes {
        self.deployment.as_ref().map_or_else(Bytes::new, |deployment| {
            let mut buf = Vec::with_capacity(20 + deployment.factory_data.len());
            buf.extend_from_slice(deployment.factory.as_slice());
            buf.extend_from_slice(&deployment.factory_data);
            buf.into()
        })
    }

    /// `paymaster ‖ u128(verificationGas) ‖ u128(postOpGas) ‖ data`, or empty.
    pub fn paymaster_and_data(&self) -> Bytes {
        self.paymaster.as_ref().map_or_else(Bytes::new, |pm| {
            let mut buf = Vec::with_capacity(52 + pm.data.len());
            buf.extend_from_slice(pm.paymaster.as_slice());
            buf.extend_from_slice(&pm.verification_gas_limit.to_be_bytes());
            buf.extend_from_slice(&pm.post_op_gas_limit.to_be_bytes());
            buf.extend_from_slice(&pm.data);
            buf.into()
        })
    }

    /// `verificationGasLimit ‖ callGasLimit`, 16 bytes each.
    pub fn account_gas_limits(&self) -> B256 {
        pack_u128_pair(self.verification_gas_limit, self.call_gas_limit)
    }

    /// `maxPriorityFeePerGas ‖ maxFeePerGas`, 16 bytes each.
    pub fn gas_fees(&self) -> B256 {
        pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas)
    }

    /// Current fee quantities.
    pub const fn fees(&self) -> Fees {
        Fees {
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
        }
    }

    /// Upper bound on what the operation can be charged, ignoring paymaster gas.
    pub fn max_gas_cost(&self) -> U256 {
        let gas = U256::from(self.call_gas_limit)
            + U256::from(self.verification_gas_limit)
            + U256::from(self.pre_verification_gas);
        gas * U256::from(self.max_fee_per_gas)
    }
}

/// JSON-RPC wire form of a v0.7 user operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcUserOperation {
    /// Account address.
    pub sender: Address,
    /// EntryPoint nonce.
    pub nonce: U256,
    /// Deployment factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    /// Deployment factory calldata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    /// Account calldata.
    pub call_data: Bytes,
    /// Execution gas.
    pub call_gas_limit: U256,
    /// Validation gas.
    pub verification_gas_limit: U256,
    /// Bundle overhead gas.
    pub pre_verification_gas: U256,
    /// Maximum total fee per gas.
    pub max_fee_per_gas: U256,
    /// Maximum priority fee per gas.
    pub max_priority_fee_per_gas: U256,
    /// Paymaster contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// Paymaster validation gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    /// Paymaster post-op gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    /// Paymaster data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    /// Operation signature.
    pub signature: Bytes,
}

impl From<&UserOperation> for RpcUserOperation {
    fn from(op: &UserOperation) -> Self {
        Self {
            sender: op.sender,
            nonce: op.nonce,
            factory: op.deployment.as_ref().map(|d| d.factory),
            factory_data: op.deployment.as_ref().map(|d| d.factory_data.clone()),
            call_data: op.call_data.clone(),
            call_gas_limit: U256::from(op.call_gas_limit),
            verification_gas_limit: U256::from(op.verification_gas_limit),
            pre_verification_gas: U256::from(op.pre_verification_gas),
            max_fee_per_gas: U256::from(op.max_fee_per_gas),
            max_priority_fee_per_gas: U256::from(op.max_priority_fee_per_gas),
            paymaster: op.paymaster.as_ref().map(|p| p.paymaster),
            paymaster_verification_gas_limit: op
                .paymaster
                .as_ref()
                .map(|p| U256::from(p.verification_gas_limit)),
            paymaster_post_op_gas_limit: op
                .paymaster
                .as_ref()
                .map(|p| U256::from(p.post_op_gas_limit)),
            paymaster_data: op.paymaster.as_ref().map(|p| p.data.clone()),
            signature: op.signature.clone(),
        }
    }
}

impl TryFrom<RpcUserOperation> for UserOperation {
    type Error = CoreError;

    fn try_from(rpc: RpcUserOperation) -> Result<Self> {
        let deployment = match (rpc.factory, rpc.factory_data) {
            (Some(factory), data) => {
                Some(DeploymentPayload { factory, factory_data: data.unwrap_or_default() })
            }
            (None, Some(data)) if !data.is_empty() => {
                return Err(CoreError::malformed("factoryData without factory"));
            }
            (None, _) => None,
        };

        let paymaster = match rpc.paymaster {
            Some(paymaster) => Some(PaymasterPayload {
                paymaster,
                verification_gas_limit: quantity(
                    rpc.paymaster_verification_gas_limit.unwrap_or_default(),
                    "paymasterVerificationGasLimit",
                )?,
                post_op_gas_limit: quantity(
                    rpc.paymaster_post_op_gas_limit.unwrap_or_default(),
                    "paymasterPostOpGasLimit",
                )?,
                data: rpc.paymaster_data.unwrap_or_default(),
            }),
            None if rpc.paymaster_data.as_ref().is_some_and(|d| !d.is_empty()) => {
                return Err(CoreError::malformed("paymasterData without paymaster"));
            }
            None => None,
        };

        Ok(Self {
            sender: rpc.sender,
            nonce: rpc.nonce,
            deployment,
            call_data: rpc.call_data,
            call_gas_limit: quantity(rpc.call_gas_limit, "callGasLimit")?,
            verification_gas_limit: quantity(rpc.verification_gas_limit, "verificationGasLimit")?,
            pre_verification_gas: quantity(rpc.pre_verification_gas, "preVerificationGas")?,
            max_fee_per_gas: quantity(rpc.max_fee_per_gas, "maxFeePerGas")?,
            max_priority_fee_per_gas: quantity(
                rpc.max_priority_fee_per_gas,
                "maxPriorityFeePerGas",
            )?,
            paymaster,
            signature: rpc.signature,
        })
    }
}

fn quantity(value: U256, field: &str) -> Result<u128> {
    u128::try_from(value).map_err(|_| CoreError::malformed(format!("{field} exceeds 128 bits")))
}
