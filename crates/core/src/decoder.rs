//! Best-effort decoding of account call payloads for preview.
//!
//! Decoding is total: anything that is not a well-formed `execute` or
//! `executeBatch` call comes back as a single [`DecodedAction::Unknown`].

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use tracing::debug;

use crate::{
    abi::{IERC20, ISmartAccount, selector_of},
    types::DecodedAction,
};

/// Decodes an operation's call payload into the actions it performs, in order.
///
/// A well-formed empty batch yields no actions.
pub fn decode_call_data(data: &[u8]) -> Vec<DecodedAction> {
    let Some(selector) = selector_of(data) else {
        return vec![DecodedAction::unknown(data)];
    };

    if selector.0 == ISmartAccount::executeCall::SELECTOR {
        return match ISmartAccount::executeCall::abi_decode(data) {
            Ok(call) => vec![classify(call.dest, call.value, call.func)],
            Err(err) => {
                debug!(message = "malformed execute payload", error = %err);
                vec![DecodedAction::unknown(data)]
            }
        };
    }

    if selector.0 == ISmartAccount::executeBatchCall::SELECTOR {
        return match ISmartAccount::executeBatchCall::abi_decode(data) {
            Ok(batch) => batch
                .calls
                .into_iter()
                .map(|call| classify(call.target, call.value, call.data))
                .collect(),
            Err(err) => {
                debug!(message = "malformed executeBatch payload", error = %err);
                vec![DecodedAction::unknown(data)]
            }
        };
    }

    vec![DecodedAction::unknown(data)]
}

/// Reads one inner call. Empty data is a value transfer, even at zero value.
fn classify(to: Address, value: U256, data: Bytes) -> DecodedAction {
    if data.is_empty() {
        return DecodedAction::EthTransfer { to, amount: value };
    }

    let selector = selector_of(&data);
    // a token call that also sends native value is reported as a plain contract call
    if value.is_zero() {
        if selector == Some(IERC20::transferCall::SELECTOR.into()) {
            if let Ok(call) = IERC20::transferCall::abi_decode(&data) {
                return DecodedAction::Erc20Transfer { token: to, to: call.to, amount: call.amount };
            }
        } else if selector == Some(IERC20::approveCall::SELECTOR.into()) {
            if let Ok(call) = IERC20::approveCall::abi_decode(&data) {
                return DecodedAction::Erc20Approve {
                    token: to,
                    spender: call.spender,
                    amount: call.amount,
                };
            }
        }
    }

    DecodedAction::ContractCall { to, value, selector, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{
        AccountCall, Call, encode_erc20_approve, encode_erc20_transfer, encode_execute, encode_execute_batch,
    };
    use alloy_primitives::{address, bytes, hex};

    const TOKEN: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");
    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");

    #[test]
    fn decodes_native_transfer() {
        let payload = AccountCall::transfer(ALICE, U256::from(500)).encode();
        assert_eq!(
            decode_call_data(&payload),
            vec![DecodedAction::EthTransfer { to: ALICE, amount: U256::from(500) }]
        );
    }

    #[test]
    fn decodes_token_transfer_and_approve() {
        let transfer = AccountCall::erc20_transfer(TOKEN, ALICE, U256::from(42)).encode();
        assert_eq!(
            decode_call_data(&transfer),
            vec![DecodedAction::Erc20Transfer { token: TOKEN, to: ALICE, amount: U256::from(42) }]
        );

        let approve = AccountCall::erc20_approve(TOKEN, ALICE, U256::MAX).encode();
        assert_eq!(
            decode_call_data(&approve),
            vec![DecodedAction::Erc20Approve { token: TOKEN, spender: ALICE, amount: U256::MAX }]
        );
    }

    #[test]
    fn decodes_batch_in_order() {
        let payload = encode_execute_batch(vec![
            Call { target: ALICE, value: U256::from(1), data: Bytes::new() },
            Call { target: TOKEN, value: U256::ZERO, data: encode_erc20_approve(ALICE, U256::from(9)) },
            Call { target: TOKEN, value: U256::from(3), data: bytes!("12345678aa") },
        ]);
        let actions = decode_call_data(&payload);
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], DecodedAction::EthTransfer { to: ALICE, amount: U256::from(1) });
        assert_eq!(
            actions[1],
            DecodedAction::Erc20Approve { token: TOKEN, spender: ALICE, amount: U256::from(9) }
        );
        assert_eq!(
            actions[2],
            DecodedAction::ContractCall {
                to: TOKEN,
                value: U256::from(3),
                selector: Some(hex!("12345678").into()),
                data: bytes!("12345678aa"),
            }
        );
    }

    #[test]
    fn empty_batch_has_no_actions() {
        assert!(decode_call_data(&encode_execute_batch(Vec::new())).is_empty());
    }

    #[test]
    fn unrecognized_inner_call_is_contract_call() {
        let payload = encode_execute(TOKEN, U256::ZERO, bytes!("a9059cbb01"));
        let actions = decode_call_data(&payload);
        assert!(matches!(actions[0], DecodedAction::ContractCall { .. }));
    }

    #[test]
    fn token_transfer_with_value_is_contract_call() {
        let data = encode_erc20_transfer(ALICE, U256::from(7));
        let payload = encode_execute(TOKEN, U256::from(1), data.clone());
        assert_eq!(
            decode_call_data(&payload),
            vec![DecodedAction::ContractCall {
                to: TOKEN,
                value: U256::from(1),
                selector: Some(IERC20::transferCall::SELECTOR.into()),
                data,
            }]
        );
    }

    #[test]
    fn garbage_never_fails() {
        let inputs: [&[u8]; 5] = [
            &[],
            &[0xb6, 0x1d],
            &hex!("b61d27f6"),
            &hex!("34fcd5be0000000000000000000000000000000000000000000000000000000000000020"),
            &hex!("deadbeefcafe"),
        ];
        for input in inputs {
            let actions = decode_call_data(input);
            assert_eq!(actions.len(), 1, "input {}", hex::encode(input));
            assert!(matches!(actions[0], DecodedAction::Unknown { .. }));
        }
    }

    #[test]
    fn truncated_execute_is_unknown() {
        let payload = AccountCall::transfer(ALICE, U256::from(1)).encode();
        for cut in [5, 40, payload.len() - 1] {
            let actions = decode_call_data(&payload[..cut]);
            assert!(matches!(actions.as_slice(), [DecodedAction::Unknown { .. }]), "cut {cut}");
        }
    }
}
