use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Recorder;
use crate::journal::{EventDetail, EventKind};
use crate::snapshot::PeerStatus;

/// A [`Recorder`] that keeps the journal and the peer map in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    inner: Arc<Mutex<MemoryBooks>>,
}

#[derive(Debug, Default)]
struct MemoryBooks {
    events: Vec<(EventKind, EventDetail)>,
    nodes: BTreeMap<String, PeerStatus>,
    // every status change, in order
    history: Vec<(String, PeerStatus)>,
}

impl MemoryRecorder {
    /// creates an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// every event recorded so far, in order
    pub fn events(&self) -> Vec<(EventKind, EventDetail)> {
        self.lock().events.clone()
    }

    /// just the kinds of the recorded events, in order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.lock().events.iter().map(|(kind, _)| *kind).collect()
    }

    /// latest status of `peer`
    pub fn status(&self, peer: &str) -> Option<PeerStatus> {
        self.lock().nodes.get(peer).copied()
    }

    /// every status change of `peer`, in order
    pub fn history(&self, peer: &str) -> Vec<PeerStatus> {
        self.lock()
            .history
            .iter()
            .filter(|(p, _)| p == peer)
            .map(|(_, status)| *status)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBooks> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Recorder for MemoryRecorder {
    fn emit(&self, kind: EventKind, detail: &EventDetail) {
        self.lock().events.push((kind, detail.clone()));
    }

    fn set(&self, peer: &str, status: PeerStatus) {
        let mut books = self.lock();
        books.nodes.insert(peer.to_string(), status);
        books.history.push((peer.to_string(), status));
    }
}
