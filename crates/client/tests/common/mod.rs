#![allow(dead_code, unreachable_pub)]

use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use keyrelay_client::{ChainError, ChainStateLookup, EngineConfig};
use keyrelay_core::{Fees, test_utils};
use serde_json::{Value, json};
use wiremock::{MockServer, Request};

pub const MAX_FEE: u128 = 1_000_000_000;
pub const PRIORITY_FEE: u128 = 100_000_000;

/// Chain view with fixed answers.
#[derive(Debug, Clone, Copy)]
pub struct StaticChain {
    pub deployed: bool,
    pub nonce: u64,
}

#[async_trait]
impl ChainStateLookup for StaticChain {
    async fn is_deployed(&self, _account: Address) -> Result<bool, ChainError> {
        Ok(self.deployed)
    }

    async fn nonce(&self, _entry_point: Address, _account: Address) -> Result<U256, ChainError> {
        Ok(U256::from(self.nonce))
    }

    async fn fee_suggestion(&self) -> Result<Fees, ChainError> {
        Ok(Fees { max_fee_per_gas: MAX_FEE, max_priority_fee_per_gas: PRIORITY_FEE })
    }
}

/// Test config with fast polling.
pub fn engine_config() -> EngineConfig {
    let mut config = EngineConfig::new(
        test_utils::TEST_ENTRY_POINT,
        test_utils::TEST_CHAIN_ID,
        test_utils::TEST_FACTORY,
        test_utils::test_creation_code(),
    );
    config.poll_interval = Duration::from_millis(20);
    config.poll_timeout = Duration::from_secs(2);
    config
}

pub fn rpc_result(result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result })
}

pub fn rpc_error(code: i64, message: &str, data: Option<Value>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({ "jsonrpc": "2.0", "id": 1, "error": error })
}

pub fn gas_estimate() -> Value {
    json!({
        "preVerificationGas": "0xc350",
        "verificationGasLimit": "0x186a0",
        "callGasLimit": "0xc350"
    })
}

pub fn receipt_json(user_op_hash: B256, sender: Address, success: bool) -> Value {
    json!({
        "userOpHash": user_op_hash,
        "sender": sender,
        "nonce": "0x0",
        "success": success,
        "actualGasCost": "0x5af3107a4000",
        "actualGasUsed": "0x30d40",
        "logs": [],
        "receipt": {
            "transactionHash": B256::repeat_byte(0x7c),
            "blockNumber": "0x10",
            "status": "0x1"
        }
    })
}

/// Bodies of every request for `method`, in arrival order.
pub async fn requests_for(server: &MockServer, method: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request: &Request| request.body_json::<Value>().ok())
        .filter(|body| body["method"] == method)
        .collect()
}
