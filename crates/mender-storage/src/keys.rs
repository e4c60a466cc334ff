//! Stable storage key constants: "auth-keys" and "pending-deployment".

/// Storage keys used by the core client. Add-ons scope their own keys under
/// a distinct prefix (see `StorageKeys::addon_prefix`) rather than reusing
/// these.
pub struct StorageKeys;

impl StorageKeys {
    /// Opaque key material (`KeyPairRecord`, JSON-encoded).
    pub const AUTH_KEYS: &'static str = "auth-keys";
    /// The persisted `PendingDeployment` record.
    pub const PENDING_DEPLOYMENT: &'static str = "pending-deployment";

    /// Prefix under which add-ons namespace their own state.
    pub fn addon_prefix(addon_name: &str) -> String {
        format!("addon/{addon_name}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_keys_are_non_empty_and_distinct() {
        assert!(!StorageKeys::AUTH_KEYS.is_empty());
        assert!(!StorageKeys::PENDING_DEPLOYMENT.is_empty());
        assert_ne!(StorageKeys::AUTH_KEYS, StorageKeys::PENDING_DEPLOYMENT);
    }

    #[test]
    fn addon_prefix_is_namespaced() {
        assert_eq!(StorageKeys::addon_prefix("inventory"), "addon/inventory/");
    }
}
