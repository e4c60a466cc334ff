//! `ClientState`: a monotonic forward progression reset only by restart.

use serde::{Deserialize, Serialize};

/// Closed set of client lifecycle states. Transitions are monotonic forward
/// within one continuous process run; a reboot resets the in-memory value to
/// `Init` (persisted reconciliation is handled separately via
/// `PendingDeployment`, not via this enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientState {
    Init,
    Authenticating,
    Authenticated,
}

impl ClientState {
    /// `Authenticated` is a sink: once reached, only a process restart moves
    /// the state back to `Init`.
    pub fn is_sink(&self) -> bool {
        matches!(self, ClientState::Authenticated)
    }
}

impl Default for ClientState {
    fn default() -> Self {
        ClientState::Init
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_init() {
        assert_eq!(ClientState::default(), ClientState::Init);
    }

    #[test]
    fn only_authenticated_is_a_sink() {
        assert!(!ClientState::Init.is_sink());
        assert!(!ClientState::Authenticating.is_sink());
        assert!(ClientState::Authenticated.is_sink());
    }
}
