//! The signing capability and its in-process implementations.
use alloy_primitives::{Address, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use keyrelay_core::{KeyMaterial, KeyType, RawSignature};
use p256::ecdsa::{Signature, SigningKey, signature::Signer};

use crate::error::SignerError;

/// Produces raw signatures over operation digests.
///
/// Implementations backed by hardware or a user prompt may take arbitrarily long
/// and may decline. Callers never issue two concurrent requests for one account.
#[async_trait]
pub trait OperationSigner: Send + Sync {
    /// Curve of the signing key.
    fn key_type(&self) -> KeyType;

    /// Signs `digest`, the operation hash. Output is not yet canonical.
    async fn sign_digest(&self, digest: B256) -> Result<RawSignature, SignerError>;
}

/// P-256 key held in memory. Signs `sha256(digest)`, which is the preimage
/// transform the account's verifier applies.
#[derive(Debug, Clone)]
pub struct LocalP256Signer {
    key: SigningKey,
}

impl LocalP256Signer {
    /// Wraps an existing key.
    pub const fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Parses a 32-byte big-endian scalar.
    pub fn from_slice(secret: &[u8]) -> Result<Self, SignerError> {
        SigningKey::from_slice(secret)
            .map(Self::new)
            .map_err(|err| SignerError::Unavailable(format!("invalid p256 key: {err}")))
    }

    /// Public coordinates for address derivation.
    pub fn key_material(&self) -> KeyMaterial {
        let point = self.key.verifying_key().to_encoded_point(false);
        let coordinate = |c: Option<&p256::FieldBytes>| c.map(|b| U256::from_be_slice(b)).unwrap_or_default();
        KeyMaterial::P256 { x: coordinate(point.x()), y: coordinate(point.y()) }
    }
}

#[async_trait]
impl OperationSigner for LocalP256Signer {
    fn key_type(&self) -> KeyType {
        KeyType::P256
    }

    async fn sign_digest(&self, digest: B256) -> Result<RawSignature, SignerError> {
        // `Signer::sign` hashes its input with SHA-256 before signing.
        let signature: Signature = self
            .key
            .try_sign(digest.as_slice())
            .map_err(|err| SignerError::Unavailable(err.to_string()))?;
        let mut rs = [0u8; 64];
        rs.copy_from_slice(&signature.to_bytes());
        Ok(RawSignature::P256(rs))
    }
}

/// secp256k1 key held in memory. Signs the digest directly.
#[derive(Debug, Clone)]
pub struct LocalSecp256k1Signer {
    inner: PrivateKeySigner,
}

impl LocalSecp256k1Signer {
    /// Wraps an alloy local signer.
    pub const fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }

    /// Parses a 32-byte secret.
    pub fn from_slice(secret: &[u8]) -> Result<Self, SignerError> {
        PrivateKeySigner::from_slice(secret)
            .map(Self::new)
            .map_err(|err| SignerError::Unavailable(format!("invalid secp256k1 key: {err}")))
    }

    /// Owner address.
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Key material for address derivation.
    pub fn key_material(&self) -> KeyMaterial {
        KeyMaterial::Secp256k1 { owner: self.address() }
    }
}

#[async_trait]
impl OperationSigner for LocalSecp256k1Signer {
    fn key_type(&self) -> KeyType {
        KeyType::Secp256k1
    }

    async fn sign_digest(&self, digest: B256) -> Result<RawSignature, SignerError> {
        let signature = self
            .inner
            .sign_hash_sync(&digest)
            .map_err(|err| SignerError::Unavailable(err.to_string()))?;
        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
        rs[32..].copy_from_slice(&signature.s().to_be_bytes::<32>());
        Ok(RawSignature::Recoverable { rs, recovery_id: u8::from(signature.v()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyrelay_core::{signature::split_rs, test_utils};
    use p256::ecdsa::{VerifyingKey, signature::Verifier};

    #[tokio::test]
    async fn p256_signature_verifies_over_sha256_of_digest() {
        let key = test_utils::p256_signing_key(7);
        let signer = LocalP256Signer::new(key.clone());
        let digest = B256::repeat_byte(0x42);

        let RawSignature::P256(rs) = signer.sign_digest(digest).await.unwrap() else {
            panic!("expected p256 signature")
        };
        let signature = Signature::from_slice(&rs).unwrap();
        VerifyingKey::from(&key).verify(digest.as_slice(), &signature).unwrap();
        assert!(split_rs(&rs).is_ok());
        assert_eq!(signer.key_material(), test_utils::p256_key_material(&key));
    }

    #[tokio::test]
    async fn secp256k1_signature_recovers_owner() {
        let signer = LocalSecp256k1Signer::new(test_utils::secp256k1_signer(3));
        let digest = B256::repeat_byte(0x24);

        let raw = signer.sign_digest(digest).await.unwrap();
        let RawSignature::Recoverable { rs, recovery_id } = raw else { panic!("expected recoverable") };
        assert!(recovery_id <= 1);

        let packed = keyrelay_core::canonicalize(&raw).unwrap();
        let signature = alloy_primitives::Signature::from_raw(&packed).unwrap();
        assert_eq!(signature.recover_address_from_prehash(&digest).unwrap(), signer.address());
        assert_eq!(&packed[..64], &rs);
    }
}
