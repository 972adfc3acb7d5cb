//! Read-only chain state the engine needs before building an operation.
use alloy_primitives::{Address, Bytes, U256, aliases::U192};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use keyrelay_core::{Fees, abi::IEntryPoint};

use crate::error::ChainError;

/// Chain queries used while preparing a submission.
#[async_trait]
pub trait ChainStateLookup: Send + Sync {
    /// Whether `account` has code.
    async fn is_deployed(&self, account: Address) -> Result<bool, ChainError>;

    /// Next EntryPoint nonce for `account` under key 0.
    async fn nonce(&self, entry_point: Address, account: Address) -> Result<U256, ChainError>;

    /// Current EIP-1559 fee suggestion.
    async fn fee_suggestion(&self) -> Result<Fees, ChainError>;
}

#[async_trait]
impl ChainStateLookup for RootProvider {
    async fn is_deployed(&self, account: Address) -> Result<bool, ChainError> {
        let code = self.get_code_at(account).await.map_err(|err| ChainError::Query(err.to_string()))?;
        Ok(!code.is_empty())
    }

    async fn nonce(&self, entry_point: Address, account: Address) -> Result<U256, ChainError> {
        let call = IEntryPoint::getNonceCall { sender: account, key: U192::ZERO };
        let request = TransactionRequest::default()
            .to(entry_point)
            .input(Bytes::from(call.abi_encode()).into());
        let output = self.call(request).await.map_err(|err| ChainError::Query(err.to_string()))?;
        U256::abi_decode(&output).map_err(|err| ChainError::Decode(err.to_string()))
    }

    async fn fee_suggestion(&self) -> Result<Fees, ChainError> {
        let estimate = self
            .estimate_eip1559_fees()
            .await
            .map_err(|err| ChainError::Query(err.to_string()))?;
        Ok(Fees {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }
}
