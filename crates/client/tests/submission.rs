mod common;

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256};
use common::{
    MAX_FEE, PRIORITY_FEE, StaticChain, engine_config, gas_estimate, receipt_json, requests_for,
    rpc_error, rpc_result,
};
use keyrelay_client::{
    BundlerClient, EngineError, LocalP256Signer, PaymasterClient, SubmissionEngine,
};
use keyrelay_core::{AccountCall, RpcUserOperation, UserOperation, test_utils};
use p256::ecdsa::{Signature, signature::Verifier};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method},
};

const ACCEPTED: B256 = B256::repeat_byte(0x0e);

fn engine(server: &MockServer, chain: StaticChain) -> SubmissionEngine {
    let bundler = BundlerClient::new(server.uri().parse().unwrap(), test_utils::TEST_ENTRY_POINT);
    SubmissionEngine::new(engine_config(), bundler, Arc::new(chain)).unwrap()
}

fn signer() -> LocalP256Signer {
    LocalP256Signer::new(test_utils::p256_signing_key(5))
}

async fn mount(server: &MockServer, rpc_method: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn sent_operation(body: &serde_json::Value) -> UserOperation {
    let rpc: RpcUserOperation = serde_json::from_value(body["params"][0].clone()).unwrap();
    UserOperation::try_from(rpc).unwrap()
}

#[tokio::test]
async fn first_operation_deploys_and_confirms() {
    let server = MockServer::start().await;
    let signer = signer();
    let engine = engine(&server, StaticChain { deployed: false, nonce: 0 });
    let account = engine.account(signer.key_material(), 0);

    mount(&server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    mount(&server, "eth_sendUserOperation", rpc_result(json!(ACCEPTED))).await;
    mount(&server, "eth_getUserOperationReceipt", rpc_result(receipt_json(ACCEPTED, account.address, true)))
        .await;

    let call = AccountCall::transfer(test_utils::TEST_RECIPIENT, U256::from(500_000_000_000_000_000u128));
    let report = engine.submit(&account, call.clone(), &signer).await.unwrap();

    assert_eq!(report.user_op_hash, ACCEPTED);
    assert!(report.deployed_account);
    assert_eq!(report.fee_replacements, 0);
    assert_eq!(report.fees.max_fee_per_gas, MAX_FEE);
    assert_ne!(report.receipt.transaction_hash(), B256::ZERO);

    let estimates = requests_for(&server, "eth_estimateUserOperationGas").await;
    let estimated = sent_operation(&estimates[0]);
    assert_eq!(estimated.deployment.map(|d| d.factory), Some(test_utils::TEST_FACTORY));
    assert_eq!(estimated.signature.len(), 64);

    let sends = requests_for(&server, "eth_sendUserOperation").await;
    assert_eq!(sends.len(), 1);
    let sent = sent_operation(&sends[0]);
    assert_eq!(sent.call_data, call.encode());
    assert_eq!(sent.verification_gas_limit, 1_000_000);
    let entry_point: Address = serde_json::from_value(sends[0]["params"][1].clone()).unwrap();
    assert_eq!(entry_point, test_utils::TEST_ENTRY_POINT);
}

#[tokio::test]
async fn deployed_account_omits_init_code() {
    let server = MockServer::start().await;
    let signer = signer();
    let engine = engine(&server, StaticChain { deployed: true, nonce: 4 });
    let account = engine.account(signer.key_material(), 0);

    mount(&server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    mount(&server, "eth_sendUserOperation", rpc_result(json!(ACCEPTED))).await;
    mount(&server, "eth_getUserOperationReceipt", rpc_result(receipt_json(ACCEPTED, account.address, true)))
        .await;

    let report = engine.submit(&account, AccountCall::Batch(Vec::new()), &signer).await.unwrap();
    assert!(!report.deployed_account);
    assert_eq!(report.nonce, U256::from(4));

    let sends = requests_for(&server, "eth_sendUserOperation").await;
    assert!(sends[0]["params"][0].get("factory").is_none());
    assert_eq!(sent_operation(&sends[0]).verification_gas_limit, 100_000);
}

#[tokio::test]
async fn fee_too_low_is_replaced_once_with_higher_fees() {
    let server = MockServer::start().await;
    let signer = signer();
    let engine = engine(&server, StaticChain { deployed: true, nonce: 0 });
    let account = engine.account(signer.key_material(), 0);

    mount(&server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_sendUserOperation" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(rpc_error(
            -32602,
            "replacement underpriced",
            Some(json!({ "currentMaxFee": "0x3b9aca00", "currentMaxPriorityFee": "0x5f5e100" })),
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount(&server, "eth_sendUserOperation", rpc_result(json!(ACCEPTED))).await;
    mount(&server, "eth_getUserOperationReceipt", rpc_result(receipt_json(ACCEPTED, account.address, true)))
        .await;

    let report = engine
        .submit(&account, AccountCall::transfer(test_utils::TEST_RECIPIENT, U256::from(1)), &signer)
        .await
        .unwrap();
    assert_eq!(report.fee_replacements, 1);
    assert!(report.fees.max_fee_per_gas > MAX_FEE);
    assert!(report.fees.max_priority_fee_per_gas > PRIORITY_FEE);

    let sends = requests_for(&server, "eth_sendUserOperation").await;
    assert_eq!(sends.len(), 2);
    let (first, second) = (sent_operation(&sends[0]), sent_operation(&sends[1]));
    assert_eq!(first.nonce, second.nonce);
    assert_ne!(first.signature, second.signature);
    assert_eq!(second.max_fee_per_gas, report.fees.max_fee_per_gas);
}

#[tokio::test]
async fn repeated_fee_rejection_surfaces_floor() {
    let server = MockServer::start().await;
    let signer = signer();
    let engine = engine(&server, StaticChain { deployed: true, nonce: 0 });
    let account = engine.account(signer.key_material(), 0);

    mount(&server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    mount(
        &server,
        "eth_sendUserOperation",
        rpc_error(
            -32602,
            "Replacement underpriced",
            Some(json!({ "currentMaxFee": "0x77359400", "currentMaxPriorityFee": "0x77359400" })),
        ),
    )
    .await;

    let err = engine.submit(&account, AccountCall::Batch(Vec::new()), &signer).await.unwrap_err();
    let EngineError::FeeTooLow(floor) = err else { panic!("expected fee floor, got {err:?}") };
    assert_eq!(floor.current_max_fee, 2_000_000_000);
    assert_eq!(requests_for(&server, "eth_sendUserOperation").await.len(), 2);
}

#[tokio::test]
async fn other_rejections_are_not_retried() {
    let server = MockServer::start().await;
    let signer = signer();
    let engine = engine(&server, StaticChain { deployed: true, nonce: 0 });
    let account = engine.account(signer.key_material(), 0);

    mount(&server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    mount(&server, "eth_sendUserOperation", rpc_error(-32500, "AA21 didn't pay prefund", None)).await;

    let err = engine.submit(&account, AccountCall::Batch(Vec::new()), &signer).await.unwrap_err();
    assert!(matches!(err, EngineError::RelayRejected(ref e) if e.code == -32500 && e.message.contains("AA21")));
    assert_eq!(requests_for(&server, "eth_sendUserOperation").await.len(), 1);
}

#[tokio::test]
async fn estimation_rejection_stops_before_signing() {
    let server = MockServer::start().await;
    let signer = signer();
    let engine = engine(&server, StaticChain { deployed: true, nonce: 0 });
    let account = engine.account(signer.key_material(), 0);

    mount(&server, "eth_estimateUserOperationGas", rpc_error(-32500, "AA23 reverted", None)).await;

    let err = engine.submit(&account, AccountCall::Batch(Vec::new()), &signer).await.unwrap_err();
    assert!(matches!(err, EngineError::RelayRejected(ref e) if e.code == -32500 && e.message.contains("AA23")));
    assert!(requests_for(&server, "eth_sendUserOperation").await.is_empty());
}

#[tokio::test]
async fn reverted_receipt_is_an_error_with_receipt() {
    let server = MockServer::start().await;
    let signer = signer();
    let engine = engine(&server, StaticChain { deployed: true, nonce: 0 });
    let account = engine.account(signer.key_material(), 0);

    mount(&server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    mount(&server, "eth_sendUserOperation", rpc_result(json!(ACCEPTED))).await;
    mount(&server, "eth_getUserOperationReceipt", rpc_result(receipt_json(ACCEPTED, account.address, false)))
        .await;

    let err = engine.submit(&account, AccountCall::Batch(Vec::new()), &signer).await.unwrap_err();
    let EngineError::Reverted(receipt) = err else { panic!("expected revert, got {err:?}") };
    assert!(!receipt.success);
    assert_eq!(receipt.user_op_hash, ACCEPTED);
}

#[tokio::test]
async fn missing_receipt_times_out() {
    let server = MockServer::start().await;
    let signer = signer();
    let mut config = engine_config();
    config.poll_timeout = std::time::Duration::from_millis(200);
    let bundler = BundlerClient::new(server.uri().parse().unwrap(), test_utils::TEST_ENTRY_POINT);
    let engine =
        SubmissionEngine::new(config, bundler, Arc::new(StaticChain { deployed: true, nonce: 0 })).unwrap();
    let account = engine.account(signer.key_material(), 0);

    mount(&server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    mount(&server, "eth_sendUserOperation", rpc_result(json!(ACCEPTED))).await;
    mount(&server, "eth_getUserOperationReceipt", rpc_result(json!(null))).await;

    let err = engine.submit(&account, AccountCall::Batch(Vec::new()), &signer).await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout { user_op_hash, .. } if user_op_hash == ACCEPTED));
    assert!(requests_for(&server, "eth_getUserOperationReceipt").await.len() >= 2);
}

#[tokio::test]
async fn paymaster_sponsorship_is_attached_before_signing() {
    let bundler_server = MockServer::start().await;
    let paymaster_server = MockServer::start().await;
    let signer = signer();
    let paymaster = PaymasterClient::new(paymaster_server.uri().parse().unwrap(), test_utils::TEST_ENTRY_POINT);
    let engine = engine(&bundler_server, StaticChain { deployed: true, nonce: 0 }).with_paymaster(paymaster);
    let account = engine.account(signer.key_material(), 0);

    mount(&bundler_server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    mount(&bundler_server, "eth_sendUserOperation", rpc_result(json!(ACCEPTED))).await;
    mount(
        &bundler_server,
        "eth_getUserOperationReceipt",
        rpc_result(receipt_json(ACCEPTED, account.address, true)),
    )
    .await;
    mount(
        &paymaster_server,
        "pm_sponsorUserOperation",
        rpc_result(json!({
            "paymaster": "0x3333333333333333333333333333333333333333",
            "paymasterData": "0xc0ffee",
            "paymasterVerificationGasLimit": "0x7530",
            "paymasterPostOpGasLimit": "0x2710",
            "preVerificationGas": "0xea60"
        })),
    )
    .await;

    engine.submit(&account, AccountCall::Batch(Vec::new()), &signer).await.unwrap();

    let sends = requests_for(&bundler_server, "eth_sendUserOperation").await;
    let sent = sent_operation(&sends[0]);
    let sponsor = sent.paymaster.clone().unwrap();
    assert_eq!(sponsor.data, Bytes::from_static(&[0xc0, 0xff, 0xee]));
    assert_eq!(sponsor.verification_gas_limit, 30_000);
    assert_eq!(sent.pre_verification_gas, 60_000);

    // the signature covers the sponsored operation
    let digest = engine.builder().signing_digest(&sent);
    let signature = Signature::from_slice(&sent.signature).unwrap();
    let verifying_key = *test_utils::p256_signing_key(5).verifying_key();
    assert!(verifying_key.verify(digest.as_slice(), &signature).is_ok());
    assert_eq!(requests_for(&paymaster_server, "pm_sponsorUserOperation").await.len(), 1);
}

#[tokio::test]
async fn paymaster_rejection_stops_before_sending() {
    let bundler_server = MockServer::start().await;
    let paymaster_server = MockServer::start().await;
    let signer = signer();
    let paymaster = PaymasterClient::new(paymaster_server.uri().parse().unwrap(), test_utils::TEST_ENTRY_POINT);
    let engine = engine(&bundler_server, StaticChain { deployed: true, nonce: 0 }).with_paymaster(paymaster);
    let account = engine.account(signer.key_material(), 0);

    mount(&bundler_server, "eth_estimateUserOperationGas", rpc_result(gas_estimate())).await;
    mount(&bundler_server, "eth_sendUserOperation", rpc_result(json!(ACCEPTED))).await;
    mount(
        &paymaster_server,
        "pm_sponsorUserOperation",
        rpc_error(-32602, "sponsorship policy rejected operation", Some(json!({"policy": "daily-cap"}))),
    )
    .await;

    let err = engine.submit(&account, AccountCall::Batch(Vec::new()), &signer).await.unwrap_err();
    let EngineError::RelayRejected(rejection) = err else { panic!("expected rejection, got {err:?}") };
    assert_eq!(rejection.code, -32602);
    assert_eq!(rejection.data, Some(json!({"policy": "daily-cap"})));
    assert_eq!(requests_for(&paymaster_server, "pm_sponsorUserOperation").await.len(), 1);
    assert!(requests_for(&bundler_server, "eth_sendUserOperation").await.is_empty());
}
