//! The live snapshot of per-peer state, published as `state.json`.
//!
//! The whole document is rewritten on every mutation: it is written to `state.json.tmp`,
//! synced, and then renamed over `state.json`. Readers therefore only ever observe a complete
//! document. The temporary path is fixed, so concurrent writers must be serialized by the
//! caller.
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// default file name of the snapshot, relative to the server's working directory
pub const SNAPSHOT_FILE: &str = "state.json";

/// identity of the server's own entry in the snapshot
pub const SERVER_ID: &str = "SERVER";

/// The status of a peer as published in the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    /// reserved for the server's own entry
    Running,
    /// connected and idle between commands
    Connected,
    /// an upload or download is in progress
    Transferring,
    /// the last command failed
    Error,
    /// the connection has ended
    Idle,
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerStatus::Running => "running",
            PeerStatus::Connected => "connected",
            PeerStatus::Transferring => "transferring",
            PeerStatus::Error => "error",
            PeerStatus::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// A single `{"ip":..,"state":..}` entry of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// peer identity
    pub ip: String,
    /// latest status of the peer
    pub state: PeerStatus,
}

/// The on-disk shape of `state.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// one entry per known peer
    pub nodes: Vec<NodeEntry>,
}

impl SnapshotDocument {
    /// looks up the status of `ip`
    pub fn status_of(&self, ip: &str) -> Option<PeerStatus> {
        self.nodes.iter().find(|n| n.ip == ip).map(|n| n.state)
    }
}

/// In-memory peer map plus the file it is published to
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    nodes: BTreeMap<String, PeerStatus>,
}

impl Snapshot {
    /// creates an empty snapshot that will be published at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Snapshot {
            path: path.into(),
            nodes: BTreeMap::new(),
        }
    }

    /// path of the published document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// the current in-memory status of `peer`
    pub fn get(&self, peer: &str) -> Option<PeerStatus> {
        self.nodes.get(peer).copied()
    }

    /// records `status` for `peer` and republishes the document.
    ///
    /// The in-memory map is updated even if publishing fails.
    pub fn set(&mut self, peer: &str, status: PeerStatus) -> Result<()> {
        self.nodes.insert(peer.to_string(), status);
        self.publish()
    }

    /// the document as it would be published now
    pub fn document(&self) -> SnapshotDocument {
        SnapshotDocument {
            nodes: self
                .nodes
                .iter()
                .map(|(ip, state)| NodeEntry {
                    ip: ip.clone(),
                    state: *state,
                })
                .collect(),
        }
    }

    /// writes the document to the temporary path and renames it over the published path
    pub fn publish(&self) -> Result<()> {
        let mut buf = serde_json::to_vec(&self.document())?;
        buf.push(b'\n');

        let tmp = tmp_path(&self.path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            writer.write_all(&buf)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// reads and parses a published snapshot
pub fn read_document(path: &Path) -> Result<SnapshotDocument> {
    let raw = fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// `state.json` -> `state.json.tmp`
fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
