use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, instrument};

use super::Recorder;
use crate::journal::{EventDetail, EventKind, Journal, JOURNAL_FILE};
use crate::snapshot::{PeerStatus, Snapshot, SNAPSHOT_FILE};
use crate::Result;

/// A [`Recorder`] that persists to `events.log` and `state.json` inside a working directory.
///
/// The journal and the snapshot share one mutex. An event and the status change that follows
/// it are each applied completely before any other worker can touch either file, so the
/// published state never runs ahead of the journal for a given peer.
#[derive(Debug, Clone)]
pub struct DiskRecorder {
    books: Arc<Mutex<Books>>,
}

#[derive(Debug)]
struct Books {
    journal: Journal,
    snapshot: Snapshot,
}

impl DiskRecorder {
    /// creates a recorder writing into `working_dir`, creating the directory if needed.
    /// Nothing is written until the first event or status change.
    #[instrument]
    pub fn open(working_dir: &Path) -> Result<DiskRecorder> {
        fs::create_dir_all(working_dir)?;
        debug!("journal and snapshot in {:?}", working_dir);
        Ok(DiskRecorder {
            books: Arc::new(Mutex::new(Books {
                journal: Journal::new(working_dir.join(JOURNAL_FILE)),
                snapshot: Snapshot::new(working_dir.join(SNAPSHOT_FILE)),
            })),
        })
    }

    /// the in-memory status of `peer`
    pub fn status(&self, peer: &str) -> Option<PeerStatus> {
        self.lock().snapshot.get(peer)
    }

    // a worker that panicked while holding the lock leaves the books usable
    fn lock(&self) -> MutexGuard<'_, Books> {
        self.books.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Recorder for DiskRecorder {
    fn emit(&self, kind: EventKind, detail: &EventDetail) {
        let books = self.lock();
        if let Err(e) = books.journal.append(kind, detail) {
            error!(
                "could not append {} event to {:?}: {}",
                kind,
                books.journal.path(),
                e
            );
        }
    }

    fn set(&self, peer: &str, status: PeerStatus) {
        let mut books = self.lock();
        if let Err(e) = books.snapshot.set(peer, status) {
            error!(
                "could not publish snapshot {:?} ({} -> {}): {}",
                books.snapshot.path(),
                peer,
                status,
                e
            );
        }
    }
}
