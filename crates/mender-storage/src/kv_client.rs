//! Typed convenience accessors over a [`SecureStorage`] backend, mirroring
//! the shape of `daemon-storage`'s `SecretsManager` wrapper.

use crate::keys::StorageKeys;
use crate::traits::SecureStorage;
use crate::{StorageError, StorageResult};
use mender_types::{KeyPairRecord, PendingDeployment};

/// High-level storage facade consumed by the client state machine and the
/// add-on surface. Wraps a `Box<dyn SecureStorage>` so the concrete backend
/// (file-based, in-memory, or a future platform port) is swappable without
/// touching call sites.
pub struct KvClient {
    storage: Box<dyn SecureStorage>,
}

impl KvClient {
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    // --- Key pair ---------------------------------------------------

    pub fn get_keys(&self) -> StorageResult<Option<KeyPairRecord>> {
        match self.storage.get(StorageKeys::AUTH_KEYS)? {
            Some(raw) => {
                let record: KeyPairRecord =
                    serde_json::from_str(&raw).map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn set_keys(&self, record: &KeyPairRecord) -> StorageResult<()> {
        let raw = serde_json::to_string(record).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::AUTH_KEYS, &raw)
    }

    pub fn delete_keys(&self) -> StorageResult<bool> {
        self.storage.delete(StorageKeys::AUTH_KEYS)
    }

    // --- Pending deployment -------------------------------------------

    pub fn get_pending_deployment(&self) -> StorageResult<Option<PendingDeployment>> {
        match self.storage.get(StorageKeys::PENDING_DEPLOYMENT)? {
            Some(raw) => {
                let record: PendingDeployment =
                    serde_json::from_str(&raw).map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    pub fn set_pending_deployment(&self, record: &PendingDeployment) -> StorageResult<()> {
        let raw = serde_json::to_string(record).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::PENDING_DEPLOYMENT, &raw)
    }

    pub fn delete_pending_deployment(&self) -> StorageResult<bool> {
        self.storage.delete(StorageKeys::PENDING_DEPLOYMENT)
    }

    // --- Add-on device config (configuration syncer) ------------------

    pub fn get_device_config(&self, addon_name: &str) -> StorageResult<Option<serde_json::Value>> {
        let key = format!("{}config", StorageKeys::addon_prefix(addon_name));
        match self.storage.get(&key)? {
            Some(raw) => {
                let value: serde_json::Value =
                    serde_json::from_str(&raw).map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn set_device_config(&self, addon_name: &str, value: &serde_json::Value) -> StorageResult<()> {
        let key = format!("{}config", StorageKeys::addon_prefix(addon_name));
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(&key, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    fn client() -> KvClient {
        KvClient::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn keys_roundtrip() {
        let client = client();
        assert!(client.get_keys().unwrap().is_none());

        let record = KeyPairRecord::new(vec![1, 2, 3], vec![4, 5, 6]);
        client.set_keys(&record).unwrap();

        let loaded = client.get_keys().unwrap().unwrap();
        assert_eq!(loaded.private_key_bytes, vec![1, 2, 3]);

        assert!(client.delete_keys().unwrap());
        assert!(client.get_keys().unwrap().is_none());
    }

    #[test]
    fn pending_deployment_roundtrip() {
        let client = client();
        assert!(client.get_pending_deployment().unwrap().is_none());

        let record = PendingDeployment::new("dep-43", "release-1.2.4");
        client.set_pending_deployment(&record).unwrap();

        let loaded = client.get_pending_deployment().unwrap().unwrap();
        assert_eq!(loaded.deployment_id, "dep-43");

        assert!(client.delete_pending_deployment().unwrap());
        assert!(client.get_pending_deployment().unwrap().is_none());
    }

    #[test]
    fn device_config_is_scoped_per_addon() {
        let client = client();
        client
            .set_device_config("configure", &serde_json::json!({"wifi-ssid": "lab"}))
            .unwrap();

        assert!(client.get_device_config("inventory").unwrap().is_none());
        let loaded = client.get_device_config("configure").unwrap().unwrap();
        assert_eq!(loaded["wifi-ssid"], "lab");
    }
}
