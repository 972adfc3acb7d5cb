//! Signature canonicalization for the two supported account key types.
use alloy_primitives::{Bytes, U256, uint};

use crate::{
    error::{CoreError, Result},
    types::KeyType,
};

/// Order `n` of the P-256 group.
pub const P256_ORDER: U256 =
    uint!(0xFFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551_U256);
/// `n / 2`; canonical signatures have `s <= P256_HALF_ORDER`.
pub const P256_HALF_ORDER: U256 =
    uint!(0x7FFFFFFF800000007FFFFFFFFFFFFFFFDE737D56D38BCF4279DCE5617E3192A8_U256);

/// Length of a packed P-256 signature (`r ‖ s`).
pub const P256_SIGNATURE_LEN: usize = 64;
/// Length of a packed recoverable signature (`r ‖ s ‖ v`).
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;

/// A signature as produced by a signer, before canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSignature {
    /// `r ‖ s` from a P-256 device; `s` may be in either half of the order.
    P256([u8; 64]),
    /// Compact secp256k1 `r ‖ s` with its recovery id.
    Recoverable {
        /// `r ‖ s`.
        rs: [u8; 64],
        /// 0/1, or already offset to 27/28.
        recovery_id: u8,
    },
}

impl RawSignature {
    /// Key type that produced this signature.
    pub const fn key_type(&self) -> KeyType {
        match self {
            Self::P256(_) => KeyType::P256,
            Self::Recoverable { .. } => KeyType::Secp256k1,
        }
    }
}

/// Splits a 64-byte `r ‖ s` into its two scalars.
pub fn split_rs(signature: &[u8]) -> Result<(U256, U256)> {
    if signature.len() != P256_SIGNATURE_LEN {
        return Err(CoreError::malformed(format!(
            "expected {P256_SIGNATURE_LEN}-byte signature, got {}",
            signature.len()
        )));
    }
    Ok((U256::from_be_slice(&signature[..32]), U256::from_be_slice(&signature[32..])))
}

/// Whether `s` lies in the lower half of the P-256 order.
pub fn is_low_s(s: U256) -> bool {
    s <= P256_HALF_ORDER
}

/// Moves `s` into the lower half of the order, leaving already-canonical input unchanged.
pub fn normalize_p256(signature: [u8; 64]) -> Result<[u8; 64]> {
    let (r, s) = split_rs(&signature)?;
    if r.is_zero() || r >= P256_ORDER {
        return Err(CoreError::malformed("p256 r out of range"));
    }
    if s.is_zero() || s >= P256_ORDER {
        return Err(CoreError::malformed("p256 s out of range"));
    }
    if is_low_s(s) {
        return Ok(signature);
    }

    let mut out = signature;
    out[32..].copy_from_slice(&(P256_ORDER - s).to_be_bytes::<32>());
    Ok(out)
}

/// Packs `r ‖ s ‖ v` with `v = recovery_id + 27`.
pub fn pack_recoverable(rs: [u8; 64], recovery_id: u8) -> Result<[u8; 65]> {
    let v = match recovery_id {
        0 | 1 => recovery_id + 27,
        27 | 28 => recovery_id,
        other => return Err(CoreError::malformed(format!("invalid recovery id {other}"))),
    };
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&rs);
    out[64] = v;
    Ok(out)
}

/// Produces the bytes the account verifies.
pub fn canonicalize(raw: &RawSignature) -> Result<Bytes> {
    match *raw {
        RawSignature::P256(sig) => Ok(Bytes::copy_from_slice(&normalize_p256(sig)?)),
        RawSignature::Recoverable { rs, recovery_id } => {
            Ok(Bytes::copy_from_slice(&pack_recoverable(rs, recovery_id)?))
        }
    }
}

/// Fixed-size filler used while estimating gas. Never empty, so signature-length
/// dependent gas is accounted for.
pub fn placeholder_signature(key_type: KeyType) -> Bytes {
    match key_type {
        KeyType::P256 => Bytes::from(vec![0u8; P256_SIGNATURE_LEN]),
        KeyType::Secp256k1 => {
            let mut sig = vec![0u8; RECOVERABLE_SIGNATURE_LEN];
            sig[64] = 27;
            Bytes::from(sig)
        }
    }
}
