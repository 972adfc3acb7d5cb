//! secp256r1 verification as the account performs it: a static call to the
//! RIP-7212 precompile, falling back to a deployed verifier contract when the
//! precompile is absent or does not report success.
//!
//! Both take `hash ‖ r ‖ s ‖ x ‖ y` (160 bytes) and return the 32-byte word `1`
//! on success. Anything else, including empty output, is a failure.

use alloy_primitives::{Address, B256, Bytes, U256, address};
use p256::{
    EncodedPoint, FieldBytes,
    ecdsa::{Signature, VerifyingKey, signature::hazmat::PrehashVerifier},
};
use sha2::{Digest, Sha256};
use tracing::debug;

/// RIP-7212 precompile address.
pub const P256_PRECOMPILE: Address = address!("0000000000000000000000000000000000000100");

/// Fallback verifier contract.
pub const FALLBACK_P256_VERIFIER: Address = address!("c2b78104907F722DABAc4C69f826a522B2754De4");

/// Length of a verifier call.
pub const VERIFY_INPUT_LEN: usize = 160;

/// Word returned on successful verification.
pub const SUCCESS_WORD: B256 = B256::with_last_byte(1);

/// Something reachable by static call that verifies P-256 signatures.
pub trait P256Verifier: Send + Sync + std::fmt::Debug {
    /// `None` when the call itself fails (no code, out of gas); otherwise the
    /// returned bytes.
    fn static_call(&self, input: &[u8]) -> Option<Bytes>;
}

/// In-process secp256r1 verification with precompile semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeP256Verifier;

impl P256Verifier for NativeP256Verifier {
    fn static_call(&self, input: &[u8]) -> Option<Bytes> {
        if input.len() != VERIFY_INPUT_LEN {
            return Some(Bytes::new());
        }
        let output = if verify_raw(input) {
            Bytes::copy_from_slice(SUCCESS_WORD.as_slice())
        } else {
            Bytes::new()
        };
        Some(output)
    }
}

fn verify_raw(input: &[u8]) -> bool {
    let word = |i: usize| FieldBytes::clone_from_slice(&input[i * 32..(i + 1) * 32]);
    let point = EncodedPoint::from_affine_coordinates(&word(3), &word(4), false);
    let Ok(key) = VerifyingKey::from_encoded_point(&point) else {
        return false;
    };
    let Ok(signature) = Signature::from_scalars(word(1), word(2)) else {
        return false;
    };
    key.verify_prehash(&input[..32], &signature).is_ok()
}

/// An address with no code: every static call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingVerifier;

impl P256Verifier for MissingVerifier {
    fn static_call(&self, _input: &[u8]) -> Option<Bytes> {
        None
    }
}

/// Precompile plus fallback, as seen from one chain.
#[derive(Debug)]
pub struct VerifierSet {
    precompile: Box<dyn P256Verifier>,
    fallback: Box<dyn P256Verifier>,
}

impl Default for VerifierSet {
    /// Chain with the precompile and no fallback contract.
    fn default() -> Self {
        Self::new(Box::new(NativeP256Verifier), Box::new(MissingVerifier))
    }
}

impl VerifierSet {
    /// Verifier pair for a chain.
    pub fn new(precompile: Box<dyn P256Verifier>, fallback: Box<dyn P256Verifier>) -> Self {
        Self { precompile, fallback }
    }

    /// Chain without the precompile, relying on the fallback contract.
    pub fn fallback_only() -> Self {
        Self::new(Box::new(MissingVerifier), Box::new(NativeP256Verifier))
    }

    /// Verifies `(r, s)` by key `(x, y)` over `sha256(message)`.
    pub fn verify(&self, message: B256, r: U256, s: U256, x: U256, y: U256) -> bool {
        let input = verify_input(message, r, s, x, y);
        if succeeded(self.precompile.static_call(&input)) {
            return true;
        }
        debug!(message = "precompile did not verify, trying fallback", precompile = %P256_PRECOMPILE);
        succeeded(self.fallback.static_call(&input))
    }
}

/// Builds the 160-byte verifier input, hashing `message` with SHA-256 first.
pub fn verify_input(message: B256, r: U256, s: U256, x: U256, y: U256) -> [u8; VERIFY_INPUT_LEN] {
    let mut input = [0u8; VERIFY_INPUT_LEN];
    input[..32].copy_from_slice(&Sha256::digest(message));
    for (i, word) in [r, s, x, y].iter().enumerate() {
        input[(i + 1) * 32..(i + 2) * 32].copy_from_slice(&word.to_be_bytes::<32>());
    }
    input
}

fn succeeded(output: Option<Bytes>) -> bool {
    output.is_some_and(|out| out.as_ref() == SUCCESS_WORD.as_slice())
}
