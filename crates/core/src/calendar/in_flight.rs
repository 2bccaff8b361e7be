//! Per-source in-flight guard
//!
//! Keeps a manual sync and a sweep (or two sweeps) from writing the same
//! source's event set at the same time within one process.

use std::collections::HashSet;
use std::sync::Arc;

use hearth_domain::SourceId;
use parking_lot::Mutex;

/// Set of sources with a sync currently running in this process.
#[derive(Debug, Clone, Default)]
pub struct InFlightSources {
    running: Arc<Mutex<HashSet<SourceId>>>,
}

impl InFlightSources {
    /// Empty guard; nothing is running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if a sync of it is already running.
    pub fn try_acquire(&self, id: SourceId) -> Option<InFlightTicket> {
        if self.running.lock().insert(id) {
            Some(InFlightTicket { id, running: Arc::clone(&self.running) })
        } else {
            None
        }
    }

    pub fn is_running(&self, id: SourceId) -> bool {
        self.running.lock().contains(&id)
    }
}

/// Releases its source when dropped.
#[derive(Debug)]
pub struct InFlightTicket {
    id: SourceId,
    running: Arc<Mutex<HashSet<SourceId>>>,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.running.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_ticket_drops() {
        let guard = InFlightSources::new();
        let id = SourceId::new();

        let ticket = guard.try_acquire(id).expect("first claim");
        assert!(guard.try_acquire(id).is_none());
        assert!(guard.try_acquire(SourceId::new()).is_some());

        drop(ticket);
        assert!(!guard.is_running(id));
        assert!(guard.try_acquire(id).is_some());
    }
}
