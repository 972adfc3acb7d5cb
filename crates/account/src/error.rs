//! Reverts raised by the account model.
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{Revert, SolError};
use keyrelay_core::abi::ISmartAccount;
use thiserror::Error;

/// A revert from the account, the factory or a callee.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Today's running total for `token` would pass its limit.
    #[error("daily limit exceeded for {token}: attempted {attempted}, limit {limit}")]
    DailyLimitExceeded {
        /// Token, or the zero address for native value.
        token: Address,
        /// Running total the call would have produced.
        attempted: U256,
        /// Configured limit.
        limit: U256,
    },
    /// Caller may not invoke this entry point.
    #[error("caller {caller} not authorized")]
    NotAuthorized {
        /// Rejected caller.
        caller: Address,
    },
    /// Signature length does not match the account's curve.
    #[error("invalid signature length {length}")]
    InvalidSignatureLength {
        /// Length received.
        length: usize,
    },
    /// Revert data from an inner call, passed through unchanged.
    #[error("call reverted: {0}")]
    CallReverted(Bytes),
}

impl AccountError {
    /// `Error(string)` revert with `reason`.
    pub fn reason(reason: impl Into<String>) -> Self {
        Self::CallReverted(Revert::from(reason.into()).abi_encode().into())
    }

    /// ABI revert data as the EVM would surface it.
    pub fn revert_data(&self) -> Bytes {
        match self {
            Self::DailyLimitExceeded { token, attempted, limit } => {
                ISmartAccount::DailyLimitExceeded { token: *token, attempted: *attempted, limit: *limit }
                    .abi_encode()
                    .into()
            }
            Self::NotAuthorized { caller } => {
                ISmartAccount::NotAuthorized { caller: *caller }.abi_encode().into()
            }
            Self::InvalidSignatureLength { length } => {
                ISmartAccount::InvalidSignatureLength { length: U256::from(*length) }.abi_encode().into()
            }
            Self::CallReverted(data) => data.clone(),
        }
    }
}
