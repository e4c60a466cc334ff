//! The KV store collaborator interface.

use crate::StorageResult;

/// Minimal byte-oriented key-value store. The core only ever needs
/// get/set/delete/has on string keys; richer helpers (key pair,
/// pending-deployment, add-on config) are built on top in [`crate::KvClient`].
pub trait SecureStorage: Send + Sync {
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn delete(&self, key: &str) -> StorageResult<bool>;

    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// List keys under a given prefix. Used by add-ons to scope their own
    /// state without colliding with the core's stable keys. Default
    /// implementation reports no keys; backends that support prefix
    /// enumeration should override this.
    fn list_keys_with_prefix(&self, _prefix: &str) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }
}
