/// Statistics tracking for an emitter
use serde::{Deserialize, Serialize};

/// Counters for monitoring one emitter
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitterStats {
    /// Listeners registered since the emitter was created
    pub listeners_bound: u64,
    /// Listeners removed, by any route
    pub listeners_unbound: u64,
    /// Calls to `emit`/`emit_with`
    pub events_emitted: u64,
    /// Callback invocations that completed successfully
    pub listeners_invoked: u64,
}

impl EmitterStats {
    /// Listeners currently registered
    pub fn active_listeners(&self) -> u64 {
        self.listeners_bound.saturating_sub(self.listeners_unbound)
    }
}
