//! The smart account: validation, execution and self-administration.
use std::{collections::HashSet, sync::Arc};

use alloy_primitives::{Address, B256, Bytes, FixedBytes, Signature, U256, fixed_bytes};
use alloy_sol_types::SolCall;
use keyrelay_core::{
    KeyMaterial, UserOperation,
    abi::{Call, IERC20, ISmartAccount, selector_of},
    signature::{P256_SIGNATURE_LEN, RECOVERABLE_SIGNATURE_LEN, is_low_s},
};
use tracing::debug;

use crate::{
    error::AccountError,
    ledger::Ledger,
    limits::{NATIVE_TOKEN, SpendingLimits},
    verifier::VerifierSet,
};

/// `validateUserOp` result for a good signature.
pub const VALIDATION_SUCCESS: U256 = U256::ZERO;

/// `validateUserOp` result for a bad signature.
pub const SIG_VALIDATION_FAILED: U256 = U256::from_limbs([1, 0, 0, 0]);

/// ERC-1271 value for a valid signature.
pub const ERC1271_MAGIC_VALUE: FixedBytes<4> = fixed_bytes!("1626ba7e");

/// ERC-1271 value for an invalid signature.
pub const ERC1271_INVALID: FixedBytes<4> = fixed_bytes!("ffffffff");

#[derive(Debug, Clone, Default)]
struct AccountState {
    signers: HashSet<Address>,
    limits: SpendingLimits,
}

/// One deployed account bound to a single key.
#[derive(Debug, Clone)]
pub struct SmartAccount {
    address: Address,
    entry_point: Address,
    key: KeyMaterial,
    verifier: Arc<VerifierSet>,
    state: AccountState,
}

impl SmartAccount {
    /// Account at `address` trusting `entry_point`.
    pub fn new(address: Address, entry_point: Address, key: KeyMaterial, verifier: Arc<VerifierSet>) -> Self {
        Self { address, entry_point, key, verifier, state: AccountState::default() }
    }

    /// Account address.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Trusted EntryPoint.
    pub const fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// Key the account validates against.
    pub const fn key(&self) -> &KeyMaterial {
        &self.key
    }

    /// Spending limits and today's totals.
    pub const fn limits(&self) -> &SpendingLimits {
        &self.state.limits
    }

    /// Whether `signer` may call `execute` directly.
    pub fn is_signer(&self, signer: Address) -> bool {
        self.state.signers.contains(&signer)
    }

    /// Checks `signature` over `hash` against the account key. Wrong length
    /// reverts, anything else that fails to verify returns `false`.
    pub fn check_signature(&self, hash: B256, signature: &[u8]) -> Result<bool, AccountError> {
        match self.key {
            KeyMaterial::P256 { x, y } => {
                if signature.len() != P256_SIGNATURE_LEN {
                    return Err(AccountError::InvalidSignatureLength { length: signature.len() });
                }
                let r = U256::from_be_slice(&signature[..32]);
                let s = U256::from_be_slice(&signature[32..]);
                if r.is_zero() || s.is_zero() || !is_low_s(s) {
                    return Ok(false);
                }
                Ok(self.verifier.verify(hash, r, s, x, y))
            }
            KeyMaterial::Secp256k1 { owner } => {
                if signature.len() != RECOVERABLE_SIGNATURE_LEN {
                    return Err(AccountError::InvalidSignatureLength { length: signature.len() });
                }
                let Ok(signature) = Signature::from_raw(signature) else {
                    return Ok(false);
                };
                Ok(signature.recover_address_from_prehash(&hash).is_ok_and(|signer| signer == owner))
            }
        }
    }

    /// `validateUserOp`: 0 for a valid signature, 1 otherwise.
    pub fn validate_user_op(
        &self,
        caller: Address,
        op: &UserOperation,
        user_op_hash: B256,
    ) -> Result<U256, AccountError> {
        if caller != self.entry_point {
            return Err(AccountError::NotAuthorized { caller });
        }
        let valid = self.check_signature(user_op_hash, &op.signature)?;
        Ok(if valid { VALIDATION_SUCCESS } else { SIG_VALIDATION_FAILED })
    }

    /// ERC-1271 `isValidSignature`.
    pub fn is_valid_signature(&self, hash: B256, signature: &[u8]) -> Result<FixedBytes<4>, AccountError> {
        let valid = self.check_signature(hash, signature)?;
        Ok(if valid { ERC1271_MAGIC_VALUE } else { ERC1271_INVALID })
    }

    /// Dispatches account calldata by selector.
    pub fn handle_call(&mut self, ledger: &mut Ledger, caller: Address, data: &[u8]) -> Result<Bytes, AccountError> {
        let Some(selector) = selector_of(data) else {
            return Err(AccountError::CallReverted(Bytes::new()));
        };
        let bad_calldata = |_| AccountError::CallReverted(Bytes::new());
        match selector.0 {
            ISmartAccount::executeCall::SELECTOR => {
                let call = ISmartAccount::executeCall::abi_decode(data).map_err(bad_calldata)?;
                self.execute(ledger, caller, call.dest, call.value, &call.func)
            }
            ISmartAccount::executeBatchCall::SELECTOR => {
                let call = ISmartAccount::executeBatchCall::abi_decode(data).map_err(bad_calldata)?;
                self.execute_batch(ledger, caller, call.calls)?;
                Ok(Bytes::new())
            }
            ISmartAccount::setDailyLimitCall::SELECTOR => {
                let call = ISmartAccount::setDailyLimitCall::abi_decode(data).map_err(bad_calldata)?;
                self.set_daily_limit(caller, call.token, call.amount)?;
                Ok(Bytes::new())
            }
            ISmartAccount::setSignerCall::SELECTOR => {
                let call = ISmartAccount::setSignerCall::abi_decode(data).map_err(bad_calldata)?;
                self.set_signer(caller, call.signer, call.authorized)?;
                Ok(Bytes::new())
            }
            _ => Err(AccountError::CallReverted(Bytes::new())),
        }
    }

    /// Single call, subject to the daily limits. Inner reverts bubble unchanged.
    ///
    /// The spend is recorded before the call runs, so a nested self-call is
    /// checked against it, and is dropped again if the call reverts.
    pub fn execute(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        dest: Address,
        value: U256,
        func: &[u8],
    ) -> Result<Bytes, AccountError> {
        self.authorize_caller(caller)?;
        let pending = self.state.limits.authorize(&spends(dest, value, func), ledger.timestamp())?;
        let limits_before = self.state.limits.clone();
        self.state.limits.commit(pending);
        let result = self.call(ledger, dest, value, func);
        if result.is_err() {
            self.state.limits = limits_before;
        }
        result
    }

    /// Calls in order; the first revert undoes the whole batch.
    ///
    /// Batched calls are not counted against the daily limits.
    pub fn execute_batch(&mut self, ledger: &mut Ledger, caller: Address, calls: Vec<Call>) -> Result<(), AccountError> {
        self.authorize_caller(caller)?;
        let ledger_before = ledger.clone();
        let state_before = self.state.clone();
        for call in calls {
            if let Err(err) = self.call(ledger, call.target, call.value, &call.data) {
                *ledger = ledger_before;
                self.state = state_before;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Sets the limit for `token`. Only callable by the account itself.
    pub fn set_daily_limit(&mut self, caller: Address, token: Address, amount: U256) -> Result<(), AccountError> {
        self.require_self(caller)?;
        debug!(message = "daily limit set", account = %self.address, %token, %amount);
        self.state.limits.set_limit(token, amount);
        Ok(())
    }

    /// Adds or removes a secondary signer. Only callable by the account itself.
    pub fn set_signer(&mut self, caller: Address, signer: Address, authorized: bool) -> Result<(), AccountError> {
        self.require_self(caller)?;
        debug!(message = "signer updated", account = %self.address, %signer, authorized);
        if authorized {
            self.state.signers.insert(signer);
        } else {
            self.state.signers.remove(&signer);
        }
        Ok(())
    }

    fn call(&mut self, ledger: &mut Ledger, dest: Address, value: U256, func: &[u8]) -> Result<Bytes, AccountError> {
        if dest == self.address {
            return self.handle_call(ledger, self.address, func);
        }
        ledger.call(self.address, dest, value, func)
    }

    fn authorize_caller(&self, caller: Address) -> Result<(), AccountError> {
        if caller == self.entry_point || caller == self.address || self.state.signers.contains(&caller) {
            Ok(())
        } else {
            Err(AccountError::NotAuthorized { caller })
        }
    }

    fn require_self(&self, caller: Address) -> Result<(), AccountError> {
        if caller == self.address { Ok(()) } else { Err(AccountError::NotAuthorized { caller }) }
    }
}

/// Amounts a single call moves out of the account, per token.
fn spends(dest: Address, value: U256, func: &[u8]) -> Vec<(Address, U256)> {
    let mut spends = Vec::new();
    if !value.is_zero() {
        spends.push((NATIVE_TOKEN, value));
    }
    match selector_of(func).map(|selector| selector.0) {
        Some(IERC20::transferCall::SELECTOR) => {
            if let Ok(call) = IERC20::transferCall::abi_decode(func) {
                spends.push((dest, call.amount));
            }
        }
        Some(IERC20::approveCall::SELECTOR) => {
            if let Ok(call) = IERC20::approveCall::abi_decode(func) {
                spends.push((dest, call.amount));
            }
        }
        _ => {}
    }
    spends
}
