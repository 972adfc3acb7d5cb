//! Error types for the transport, chain, signer and engine layers.
use std::time::Duration;

use alloy_primitives::B256;
use keyrelay_core::CoreError;
use thiserror::Error;

use crate::{bundler::FeeFloor, receipt::UserOperationReceipt, rpc::RpcErrorObject};

/// Failure of a single JSON-RPC call.
#[derive(Debug, Error)]
pub enum RpcCallError {
    /// The request never produced a response body (after retries).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a JSON-RPC error object.
    #[error("rpc error {}: {}", .0.code, .0.message)]
    Rpc(RpcErrorObject),
    /// The body was not a JSON-RPC response of the expected shape.
    #[error("invalid response (http {status}): {reason}")]
    InvalidResponse {
        /// HTTP status code.
        status: u16,
        /// Decoder message.
        reason: String,
    },
}

/// Failure querying chain state.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The node request failed.
    #[error("chain query failed: {0}")]
    Query(String),
    /// The node returned data that could not be decoded.
    #[error("chain response malformed: {0}")]
    Decode(String),
}

/// Failure obtaining a signature.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The user or device refused to sign.
    #[error("signing declined")]
    Declined,
    /// The signer could not be reached or failed internally.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// Terminal failure of a submission.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Local data could not be encoded or a signature was malformed.
    #[error(transparent)]
    MalformedInput(#[from] CoreError),
    /// The relay or paymaster rejected the operation with a JSON-RPC error.
    #[error("relay rejected operation ({}): {}", .0.code, .0.message)]
    RelayRejected(RpcErrorObject),
    /// The relay still reported the fee as too low after the allowed replacements.
    #[error(
        "fee too low: relay requires more than max fee {} / priority fee {}",
        .0.current_max_fee,
        .0.current_max_priority_fee
    )]
    FeeTooLow(FeeFloor),
    /// No receipt appeared before the polling deadline.
    #[error("no receipt for {user_op_hash} after {waited:?}")]
    Timeout {
        /// Hash returned by the relay.
        user_op_hash: B256,
        /// Time spent polling.
        waited: Duration,
    },
    /// The operation was included but its execution reverted.
    #[error("operation {} reverted in {}", .0.user_op_hash, .0.receipt.transaction_hash)]
    Reverted(Box<UserOperationReceipt>),
    /// The signer declined or failed. Nothing was sent to the relay with this signature.
    #[error(transparent)]
    SignerUnavailable(#[from] SignerError),
    /// The relay or paymaster could not be reached, or its answer could not be read.
    #[error(transparent)]
    Transport(RpcCallError),
    /// Chain state could not be read.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// Engine configuration is inconsistent.
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

impl From<RpcCallError> for EngineError {
    fn from(err: RpcCallError) -> Self {
        match err {
            RpcCallError::Rpc(error) => Self::RelayRejected(error),
            other => Self::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_objects_are_rejections() {
        let rejected = EngineError::from(RpcCallError::Rpc(RpcErrorObject {
            code: -32500,
            message: "AA23 reverted".into(),
            data: None,
        }));
        assert!(matches!(rejected, EngineError::RelayRejected(ref e) if e.message.starts_with("AA23")));

        let unreadable = EngineError::from(RpcCallError::InvalidResponse { status: 502, reason: "eof".into() });
        assert!(matches!(unreadable, EngineError::Transport(_)));
    }
}
