//! The add-on surface: optional collaborators of the client state
//! machine — an inventory reporter, a configuration syncer, and a remote
//! shell bridge stub — each owning its own scheduler work item,
//! independent of the client's own. None of them mutate the state
//! machine's `SessionToken` or `PendingDeployment` directly; they go
//! through the `ApiClient` exactly as the core update flow does.

mod configure;
mod inventory;
mod remote_shell;

pub use configure::ConfigurationSyncer;
pub use inventory::InventoryReporter;
pub use remote_shell::RemoteShellBridge;

/// Lifecycle hooks every add-on exposes to `Client::register_addon`.
/// Firing logic itself is addon-specific (see each struct's `fire`/
/// `work_callback`); this trait covers only the bookkeeping
/// `register_addon` needs to hold a heterogeneous collection of add-ons.
pub trait Addon: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-time setup performed when `register_addon` is called. Default
    /// no-op; add-ons that need to prime cached state override this.
    fn init(&self) {}
    fn activate(&self) {}
    fn deactivate(&self) {}
    fn exit(&self) {}
}
