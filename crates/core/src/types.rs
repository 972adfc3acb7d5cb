//! Account identity and decoded-action types.

use alloy_primitives::{Address, Bytes, Selector, U256};
use serde::{Deserialize, Serialize};

/// Curve of the key that authorizes operations for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Hardware-bound secp256r1 key, verified through the P-256 precompile.
    P256,
    /// Software secp256k1 key, verified through `ecrecover`.
    Secp256k1,
}

/// Public key material an account is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KeyMaterial {
    /// Affine coordinates of a P-256 public key.
    P256 {
        /// X coordinate.
        x: U256,
        /// Y coordinate.
        y: U256,
    },
    /// Owner address recovered from secp256k1 signatures.
    Secp256k1 {
        /// Owner address.
        owner: Address,
    },
}

impl KeyMaterial {
    /// Curve of this key.
    pub const fn key_type(&self) -> KeyType {
        match self {
            Self::P256 { .. } => KeyType::P256,
            Self::Secp256k1 { .. } => KeyType::Secp256k1,
        }
    }
}

/// A locally known smart account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    /// Local ordinal, also used as the CREATE2 salt.
    pub index: u64,
    /// Counterfactual (or deployed) account address.
    pub address: Address,
    /// Key material the account validates against.
    pub key: KeyMaterial,
    /// Last observed deployment state. Only a chain query makes this authoritative.
    pub deployed: bool,
}

impl AccountIdentity {
    /// Curve of the account key.
    pub const fn key_type(&self) -> KeyType {
        self.key.key_type()
    }
}

/// A human-meaningful reading of one call inside an operation's call payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecodedAction {
    /// Native value sent with no inner calldata.
    EthTransfer {
        /// Recipient.
        to: Address,
        /// Amount in wei.
        amount: U256,
    },
    /// ERC-20 `transfer`.
    Erc20Transfer {
        /// Token contract.
        token: Address,
        /// Recipient.
        to: Address,
        /// Token amount in base units.
        amount: U256,
    },
    /// ERC-20 `approve`.
    Erc20Approve {
        /// Token contract.
        token: Address,
        /// Approved spender.
        spender: Address,
        /// Allowance in base units.
        amount: U256,
    },
    /// Any other call the account makes.
    ContractCall {
        /// Call destination.
        to: Address,
        /// Native value forwarded.
        value: U256,
        /// Leading four bytes of `data`, when present.
        selector: Option<Selector>,
        /// Raw inner calldata.
        data: Bytes,
    },
    /// Payload that could not be interpreted.
    Unknown {
        /// Leading four bytes, when present.
        selector: Option<Selector>,
        /// The bytes that failed to decode.
        data: Bytes,
    },
}

impl DecodedAction {
    /// Builds an [`DecodedAction::Unknown`] carrying whatever selector `data` starts with.
    pub fn unknown(data: &[u8]) -> Self {
        Self::Unknown { selector: crate::abi::selector_of(data), data: Bytes::copy_from_slice(data) }
    }
}
