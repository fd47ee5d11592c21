//! This module provides the bookkeeping sinks the protocol engine reports to.
//! [`DiskRecorder`] appends to the event journal and publishes the state snapshot, both behind
//! a single lock. [`MemoryRecorder`] keeps everything in memory and is meant for tests and
//! embedding.
use crate::journal::{EventDetail, EventKind};
use crate::snapshot::PeerStatus;

/// A trait for the sinks that observe a connection: the event journal and the peer state map.
///
/// Each worker owns a clone. Implementations must never fail the caller: a sink that cannot
/// write reports the problem on the operator stream and carries on.
pub trait Recorder: Clone + Send + 'static {
    /// records an event of the given `kind`
    fn emit(&self, kind: EventKind, detail: &EventDetail);

    /// records `status` as the latest status of `peer`
    fn set(&self, peer: &str, status: PeerStatus);
}

mod disk;
mod memory;

pub use self::disk::DiskRecorder;
pub use self::memory::MemoryRecorder;
