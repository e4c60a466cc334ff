//! The signing seam between the Crypto collaborator and the API client,
//! defined here so `mender-api-client` depends only on this crate rather
//! than on `mender-crypto` directly.

/// Signs a raw request body, returning the base64-encoded signature carried
/// in the `X-MEN-Signature` header. Implemented by `mender_crypto::DeviceCrypto`.
pub trait Signer {
    fn sign(&self, payload: &[u8]) -> String;
}
