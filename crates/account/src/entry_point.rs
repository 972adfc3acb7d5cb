//! Single-operation EntryPoint: deploy, check the nonce, validate, charge, execute.
use std::collections::HashMap;

use alloy_primitives::{Address, B256, Bytes, U256, aliases::U192};
use keyrelay_core::{OperationHasher, UserOperation};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{account::VALIDATION_SUCCESS, factory::AccountFactory, ledger::Ledger};

/// Validation-phase failure. The operation leaves no trace: no deployment,
/// no nonce increment, no charge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryPointError {
    /// `FailedOp(0, reason)` with an `AAxx` reason code.
    #[error("FailedOp: {reason}")]
    FailedOp {
        /// Reason code and text.
        reason: String,
    },
}

fn failed_op(reason: impl Into<String>) -> EntryPointError {
    EntryPointError::FailedOp { reason: reason.into() }
}

/// Outcome of an operation that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Hash the account validated.
    pub user_op_hash: B256,
    /// Whether the account call succeeded.
    pub success: bool,
    /// Revert data of a failed call.
    pub revert_data: Bytes,
    /// Whether this operation deployed the account.
    pub deployed: bool,
    /// Amount charged to the account or paymaster.
    pub actual_gas_cost: U256,
}

/// EntryPoint holding the world state the accounts act on.
///
/// Gas is charged at the operation's maximum cost and not refunded.
#[derive(Debug)]
pub struct EntryPointSimulator {
    hasher: OperationHasher,
    factory: AccountFactory,
    ledger: Ledger,
    nonces: HashMap<(Address, U256), u64>,
}

impl EntryPointSimulator {
    /// EntryPoint at `hasher.entry_point()` with a single known factory.
    pub fn new(hasher: OperationHasher, factory: AccountFactory, ledger: Ledger) -> Self {
        Self { hasher, factory, ledger, nonces: HashMap::new() }
    }

    /// EntryPoint address.
    pub const fn address(&self) -> Address {
        self.hasher.entry_point()
    }

    /// World state.
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Mutable world state, for funding and clock changes.
    pub const fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// The factory and its deployed accounts.
    pub const fn factory(&self) -> &AccountFactory {
        &self.factory
    }

    /// Hash an operation is validated against.
    pub fn user_op_hash(&self, op: &UserOperation) -> B256 {
        self.hasher.operation_hash(op)
    }

    /// `getNonce(sender, key)`: `key << 64 | sequence`.
    pub fn get_nonce(&self, sender: Address, key: U192) -> U256 {
        let key = U256::from(key);
        let sequence = self.nonces.get(&(sender, key)).copied().unwrap_or_default();
        (key << 64) | U256::from(sequence)
    }

    /// Runs one operation. Validation failures leave state untouched; execution
    /// failures keep the deployment, the nonce increment and the charge.
    pub fn handle_op(&mut self, op: &UserOperation) -> Result<ExecutionResult, EntryPointError> {
        let entry_point = self.address();
        let user_op_hash = self.user_op_hash(op);
        let mut ledger = self.ledger.clone();
        let mut factory = self.factory.clone();

        let deployed = op.deployment.is_some();
        if let Some(deployment) = &op.deployment {
            if ledger.has_code(op.sender) {
                return Err(failed_op("AA10 sender already constructed"));
            }
            if deployment.factory != factory.address() {
                return Err(failed_op("AA13 initCode failed or OOG"));
            }
            factory
                .handle_call(&mut ledger, &deployment.factory_data)
                .map_err(|err| failed_op(format!("AA13 initCode failed or OOG: {err}")))?;
            if !ledger.has_code(op.sender) {
                return Err(failed_op("AA14 initCode must return sender"));
            }
        }

        let key = op.nonce >> 64;
        let sequence = op.nonce & U256::from(u64::MAX);
        let expected = self.nonces.get(&(op.sender, key)).copied().unwrap_or_default();
        if sequence != U256::from(expected) {
            return Err(failed_op("AA25 invalid account nonce"));
        }

        let account = factory.account(op.sender).ok_or_else(|| failed_op("AA20 account not deployed"))?;
        match account.validate_user_op(entry_point, op, user_op_hash) {
            Ok(result) if result == VALIDATION_SUCCESS => {}
            Ok(_) => return Err(failed_op("AA24 signature error")),
            Err(err) => return Err(failed_op(format!("AA23 reverted: {err}"))),
        }

        let cost = op.max_gas_cost();
        let (payer, shortfall) = match &op.paymaster {
            Some(paymaster) => (paymaster.paymaster, "AA31 paymaster deposit too low"),
            None => (op.sender, "AA21 didn't pay prefund"),
        };
        ledger.transfer(payer, entry_point, cost).map_err(|_| failed_op(shortfall))?;

        let account = factory.account_mut(op.sender).ok_or_else(|| failed_op("AA20 account not deployed"))?;
        let ledger_before = ledger.clone();
        let account_before = account.clone();
        let (success, revert_data) = match account.handle_call(&mut ledger, entry_point, &op.call_data) {
            Ok(_) => (true, Bytes::new()),
            Err(err) => {
                warn!(message = "operation reverted", sender = %op.sender, %user_op_hash, error = %err);
                ledger = ledger_before;
                *account = account_before;
                (false, err.revert_data())
            }
        };

        self.nonces.insert((op.sender, key), expected + 1);
        self.ledger = ledger;
        self.factory = factory;
        debug!(message = "operation handled", sender = %op.sender, %user_op_hash, success, deployed);
        Ok(ExecutionResult { user_op_hash, success, revert_data, deployed, actual_gas_cost: cost })
    }
}

