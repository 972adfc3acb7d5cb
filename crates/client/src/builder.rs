//! Stateless assembly of user operations.
use alloy_primitives::{B256, U256};
use keyrelay_core::{
    AccountCall, AccountIdentity, AddressDeriver, DecodedAction, Fees, GasEstimate, KeyType,
    OperationHasher, RawSignature, Result, UserOperation, canonicalize, decode_call_data,
    placeholder_signature,
};
use tracing::debug;

use crate::paymaster::SponsorResult;

/// Default factor applied to estimated verification gas for first deployments.
pub const DEFAULT_DEPLOYMENT_VERIFICATION_GAS_MULTIPLIER: u64 = 10;

/// Builds, prices and signs operations for one EntryPoint and factory.
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    hasher: OperationHasher,
    deriver: AddressDeriver,
    deployment_verification_gas_multiplier: u64,
}

impl OperationBuilder {
    /// Builder with the default deployment multiplier.
    pub const fn new(hasher: OperationHasher, deriver: AddressDeriver) -> Self {
        Self {
            hasher,
            deriver,
            deployment_verification_gas_multiplier: DEFAULT_DEPLOYMENT_VERIFICATION_GAS_MULTIPLIER,
        }
    }

    /// Overrides the factor applied to verification gas for deployments.
    pub const fn with_deployment_multiplier(mut self, multiplier: u64) -> Self {
        self.deployment_verification_gas_multiplier = multiplier;
        self
    }

    /// Hasher used for signing digests.
    pub const fn hasher(&self) -> &OperationHasher {
        &self.hasher
    }

    /// Fresh operation with zeroed gas and fees and a placeholder signature, ready for
    /// estimation. Carries the deployment payload when the account is not yet deployed.
    pub fn build(&self, account: &AccountIdentity, nonce: U256, call: &AccountCall) -> UserOperation {
        let deployment =
            (!account.deployed).then(|| self.deriver.deployment_payload(&account.key, account.index));
        UserOperation {
            sender: account.address,
            nonce,
            deployment,
            call_data: call.encode(),
            signature: placeholder_signature(account.key_type()),
            ..Default::default()
        }
    }

    /// Applies bundler gas estimates. Operations that deploy the account get their
    /// verification gas multiplied, since estimators under-quote first deployments.
    pub fn apply_estimate(&self, op: &mut UserOperation, estimate: &GasEstimate) {
        op.pre_verification_gas = estimate.pre_verification_gas;
        op.call_gas_limit = estimate.call_gas_limit;
        op.verification_gas_limit = if op.deployment.is_some() {
            estimate
                .verification_gas_limit
                .saturating_mul(u128::from(self.deployment_verification_gas_multiplier))
        } else {
            estimate.verification_gas_limit
        };
        debug!(
            message = "applied gas estimate",
            sender = %op.sender,
            deploying = op.deployment.is_some(),
            verification_gas_limit = op.verification_gas_limit,
            call_gas_limit = op.call_gas_limit,
            pre_verification_gas = op.pre_verification_gas
        );
    }

    /// Sets fee-market fields.
    pub const fn apply_fees(&self, op: &mut UserOperation, fees: Fees) {
        op.max_fee_per_gas = fees.max_fee_per_gas;
        op.max_priority_fee_per_gas = fees.max_priority_fee_per_gas;
    }

    /// Attaches sponsorship. Gas quantities from the paymaster replace the estimate.
    pub fn apply_sponsorship(&self, op: &mut UserOperation, sponsor: &SponsorResult) {
        op.paymaster = Some(sponsor.payload());
        if let Some(gas) = sponsor.pre_verification_gas {
            op.pre_verification_gas = gas;
        }
        if let Some(gas) = sponsor.verification_gas_limit {
            op.verification_gas_limit = gas;
        }
        if let Some(gas) = sponsor.call_gas_limit {
            op.call_gas_limit = gas;
        }
    }

    /// Digest the account's key must sign.
    pub fn signing_digest(&self, op: &UserOperation) -> B256 {
        self.hasher.operation_hash(op)
    }

    /// Canonicalizes `raw` and attaches it.
    pub fn attach_signature(&self, op: &mut UserOperation, raw: &RawSignature) -> Result<()> {
        op.signature = canonicalize(raw)?;
        Ok(())
    }

    /// Replaces the signature with the estimation placeholder.
    pub fn reset_signature(&self, op: &mut UserOperation, key_type: KeyType) {
        op.signature = placeholder_signature(key_type);
    }

    /// What the operation's call payload does.
    pub fn preview(&self, op: &UserOperation) -> Vec<DecodedAction> {
        decode_call_data(&op.call_data)
    }
}
