use std::sync::mpsc::Sender;

use log::{info, warn};

use crate::core::search::{SearchOutcome, SearchPhase};

/// Receives notifications from a running search. Hooks may be called from
/// several worker threads at once.
pub trait SearchObserver: Sync {
    fn on_start(&self, _original_digest: &str, _prefix: &str) {}

    fn on_phase(&self, _phase: SearchPhase) {}

    /// `digest_prefix` is the current digest cut to the prefix length.
    fn on_progress(&self, _attempts: u64, _digest_prefix: &str) {}

    fn on_found(&self, _outcome: &SearchOutcome) {}
}

/// Discards every notification.
pub struct NullObserver;

impl SearchObserver for NullObserver {}

/// Reports through the `log` facade.
pub struct LogObserver;

impl SearchObserver for LogObserver {
    fn on_start(&self, original_digest: &str, prefix: &str) {
        info!("Original digest {} (target prefix {})", original_digest, prefix);
    }

    fn on_phase(&self, phase: SearchPhase) {
        if phase == SearchPhase::Aborted {
            warn!("Search aborted");
        }
    }

    fn on_progress(&self, attempts: u64, digest_prefix: &str) {
        info!("Attempt {}: current hash prefix {:?}", attempts, digest_prefix);
    }

    fn on_found(&self, outcome: &SearchOutcome) {
        info!("Success after {} attempts: {}", outcome.attempts, outcome.digest);
    }
}

/// Owned copy of a notification, for callers that prefer a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Started { original_digest: String, prefix: String },
    Phase(SearchPhase),
    Progress { attempts: u64, digest_prefix: String },
    Found { attempts: u64, digest: String },
}

// A disconnected receiver only means nobody is listening any more.
impl SearchObserver for Sender<SearchEvent> {
    fn on_start(&self, original_digest: &str, prefix: &str) {
        let _ = self.send(SearchEvent::Started {
            original_digest: original_digest.to_string(),
            prefix: prefix.to_string(),
        });
    }

    fn on_phase(&self, phase: SearchPhase) {
        let _ = self.send(SearchEvent::Phase(phase));
    }

    fn on_progress(&self, attempts: u64, digest_prefix: &str) {
        let _ = self.send(SearchEvent::Progress {
            attempts,
            digest_prefix: digest_prefix.to_string(),
        });
    }

    fn on_found(&self, outcome: &SearchOutcome) {
        let _ = self.send(SearchEvent::Found {
            attempts: outcome.attempts,
            digest: outcome.digest.clone(),
        });
    }
}
