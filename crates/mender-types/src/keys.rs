//! Persisted key-pair container, stored under the "auth-keys" stable key.

use serde::{Deserialize, Serialize};

/// Opaque key material persisted under the "auth-keys" stable key. The
/// byte encoding is owned by the crypto collaborator; this type is the
/// storage-facing envelope the KV store round-trips unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPairRecord {
    /// Private key bytes, in whatever encoding the crypto collaborator uses.
    pub private_key_bytes: Vec<u8>,
    /// Public key bytes, in the same encoding.
    pub public_key_bytes: Vec<u8>,
}

impl KeyPairRecord {
    pub fn new(private_key_bytes: Vec<u8>, public_key_bytes: Vec<u8>) -> Self {
        Self {
            private_key_bytes,
            public_key_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let record = KeyPairRecord::new(vec![1, 2, 3], vec![4, 5, 6]);
        let json = serde_json::to_string(&record).unwrap();
        let restored: KeyPairRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.private_key_bytes, vec![1, 2, 3]);
        assert_eq!(restored.public_key_bytes, vec![4, 5, 6]);
    }
}
