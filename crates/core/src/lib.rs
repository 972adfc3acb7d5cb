#![doc = include_str!("../README.md")]

pub mod abi;
pub mod address;
pub mod decoder;
pub mod error;
pub mod hash;
pub mod logger;
pub mod signature;
pub mod types;
pub mod user_operation;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use abi::{AccountCall, Call};
pub use address::AddressDeriver;
pub use decoder::decode_call_data;
pub use error::{CoreError, Result};
pub use hash::{HashScheme, OperationHasher};
pub use signature::{RawSignature, canonicalize, placeholder_signature};
pub use types::{AccountIdentity, DecodedAction, KeyMaterial, KeyType};
pub use user_operation::{
    DeploymentPayload, Fees, GasEstimate, PaymasterPayload, RpcUserOperation, UserOperation,
};
