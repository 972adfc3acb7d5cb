//! Fixtures shared by unit and integration tests.
use alloy_primitives::{Address, B256, Bytes, U256, address, bytes};
use alloy_signer_local::PrivateKeySigner;
use p256::ecdsa::SigningKey;

use crate::{
    abi::AccountCall,
    address::AddressDeriver,
    hash::OperationHasher,
    types::KeyMaterial,
    user_operation::UserOperation,
};

/// Canonical v0.7 EntryPoint address.
pub const TEST_ENTRY_POINT: Address = address!("0000000071727de22e5e9d8baf0edac6f37da032");
/// Factory used by test deployments.
pub const TEST_FACTORY: Address = address!("9406cc6185a346906296840746125a0e44976454");
/// Chain id used by tests (Base mainnet).
pub const TEST_CHAIN_ID: u64 = 8453;
/// Recipient used by transfer fixtures.
pub const TEST_RECIPIENT: Address = address!("00000000000000000000000000000000000a11ce");

/// Stand-in account creation code.
pub fn test_creation_code() -> Bytes {
    bytes!("60806040")
}

/// Deriver bound to the test factory and EntryPoint.
pub fn test_deriver() -> AddressDeriver {
    AddressDeriver::new(TEST_FACTORY, TEST_ENTRY_POINT, test_creation_code())
}

/// Hasher bound to the test EntryPoint and chain.
pub const fn test_hasher() -> OperationHasher {
    OperationHasher::new(TEST_ENTRY_POINT, TEST_CHAIN_ID)
}

/// Deterministic P-256 key. `seed` must be non-zero.
pub fn p256_signing_key(seed: u64) -> SigningKey {
    SigningKey::from_slice(&U256::from(seed).to_be_bytes::<32>()).expect("valid p256 scalar")
}

/// Public coordinates of a P-256 key.
pub fn p256_key_material(key: &SigningKey) -> KeyMaterial {
    let point = key.verifying_key().to_encoded_point(false);
    let x = point.x().expect("uncompressed point has x");
    let y = point.y().expect("uncompressed point has y");
    KeyMaterial::P256 { x: U256::from_be_slice(x), y: U256::from_be_slice(y) }
}

/// Deterministic secp256k1 signer. `seed` must be non-zero.
pub fn secp256k1_signer(seed: u64) -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::from(U256::from(seed))).expect("valid secp256k1 scalar")
}

/// Unsigned operation sending `value` wei to [`TEST_RECIPIENT`].
pub fn transfer_operation(sender: Address, value: U256) -> UserOperation {
    UserOperation {
        sender,
        call_data: AccountCall::transfer(TEST_RECIPIENT, value).encode(),
        call_gas_limit: 50_000,
        verification_gas_limit: 150_000,
        pre_verification_gas: 48_000,
        max_fee_per_gas: 2_000_000_000,
        max_priority_fee_per_gas: 1_000_000_000,
        ..Default::default()
    }
}
