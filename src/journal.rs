//! The append-only NDJSON event journal.
//!
//! Every observable protocol event is written as a single line of the form
//! `{"ts":"<iso8601>","type":"<kind>","detail":{...}}`. The journal file is re-opened in
//! append mode for each record, so a journal that is truncated or rotated by an outside
//! process is simply re-created on the next event.
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clock;
use crate::Result;

/// default file name of the journal, relative to the server's working directory
pub const JOURNAL_FILE: &str = "events.log";

/// The kinds of events recorded in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// a client connection was accepted and its worker started
    ClientConnected,
    /// a client's worker finished and its socket was closed
    ClientDisconnected,
    /// an upload was accepted and the server is waiting for payload
    PutStart,
    /// an upload received all of its payload
    PutDone,
    /// a download started, its `SIZE` header is about to be sent
    GetStart,
    /// a download sent all of its payload
    GetDone,
    /// a protocol or transfer error
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::ClientConnected => "client_connected",
            EventKind::ClientDisconnected => "client_disconnected",
            EventKind::PutStart => "put_start",
            EventKind::PutDone => "put_done",
            EventKind::GetStart => "get_start",
            EventKind::GetDone => "get_done",
            EventKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// The `detail` object of a journal record.
///
/// Only `ip` is always present, the other keys are omitted when `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
    /// identity of the peer the event belongs to
    pub ip: String,
    /// short error code, only set for [`EventKind::Error`]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub what: Option<String>,
    /// file name involved in a transfer
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
    /// transfer size in bytes
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,
    /// the offending command line of an `unknown_cmd` error
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cmd: Option<String>,
}

impl EventDetail {
    /// a detail carrying only the peer identity
    pub fn peer(ip: &str) -> Self {
        EventDetail {
            ip: ip.to_string(),
            ..Default::default()
        }
    }

    /// a detail describing a transfer of `file` with `size` bytes
    pub fn transfer(ip: &str, file: &str, size: u64) -> Self {
        EventDetail {
            ip: ip.to_string(),
            file: Some(file.to_string()),
            size: Some(size),
            ..Default::default()
        }
    }

    /// a detail for an error event, `what` being the error code
    pub fn error(ip: &str, what: &str) -> Self {
        EventDetail {
            ip: ip.to_string(),
            what: Some(what.to_string()),
            ..Default::default()
        }
    }

    /// attaches a file name
    pub fn with_file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    /// attaches the command line that caused the event
    pub fn with_cmd(mut self, cmd: &str) -> Self {
        self.cmd = Some(cmd.to_string());
        self
    }
}

/// One line of the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// ISO-8601 UTC timestamp with millisecond precision
    pub ts: String,
    /// the event kind
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// kind specific details
    pub detail: EventDetail,
}

/// Appends [`EventRecord`]s to a journal file.
///
/// A `Journal` does no locking of its own, callers serialize access (see [`DiskRecorder`]).
///
/// [`DiskRecorder`]: crate::DiskRecorder
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// creates a journal that appends to the file at `path`. The file is created lazily
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Journal { path: path.into() }
    }

    /// path of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// stamps the event with the current time and appends it as a single line
    pub fn append(&self, kind: EventKind, detail: &EventDetail) -> Result<()> {
        let record = EventRecord {
            ts: clock::now_iso(),
            kind,
            detail: detail.clone(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // one write call per record keeps lines whole even if another process appends
        file.write_all(&line)?;
        Ok(())
    }
}

/// reads every record of the journal at `path`, in append order
pub fn read_records(path: &Path) -> Result<Vec<EventRecord>> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::new(dir.path().join(JOURNAL_FILE));
        journal.append(EventKind::ClientConnected, &EventDetail::peer("10.0.0.1")).unwrap();
        journal
            .append(EventKind::PutStart, &EventDetail::transfer("10.0.0.1", "a.bin", 5))
            .unwrap();

        let contents = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"ts":""#));
        assert!(lines[0].ends_with(r#","type":"client_connected","detail":{"ip":"10.0.0.1"}}"#));
        assert!(lines[1]
            .ends_with(r#","type":"put_start","detail":{"ip":"10.0.0.1","file":"a.bin","size":5}}"#));
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn escapes_strings_in_details() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::new(dir.path().join(JOURNAL_FILE));
        let detail = EventDetail::error("10.0.0.1", "unknown_cmd").with_cmd("SAY \"hi\"\t\u{1}");
        journal.append(EventKind::Error, &detail).unwrap();

        let raw = std::fs::read_to_string(journal.path()).unwrap();
        assert!(raw.contains(r#""cmd":"SAY \"hi\"\t\u0001""#));
        let records = read_records(journal.path()).unwrap();
        assert_eq!(records[0].detail, detail);
        assert_eq!(records[0].kind, EventKind::Error);
    }

    #[test]
    fn survives_external_truncation() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::new(dir.path().join(JOURNAL_FILE));
        journal.append(EventKind::ClientConnected, &EventDetail::peer("a")).unwrap();
        std::fs::remove_file(journal.path()).unwrap();
        journal.append(EventKind::ClientDisconnected, &EventDetail::peer("a")).unwrap();

        let records = read_records(journal.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, EventKind::ClientDisconnected);
    }

    #[test]
    fn fails_when_directory_is_missing() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::new(dir.path().join("missing").join(JOURNAL_FILE));
        assert!(journal.append(EventKind::Error, &EventDetail::peer("a")).is_err());
    }

    #[test]
    fn kind_display_matches_wire_name() {
        assert_eq!(EventKind::GetDone.to_string(), "get_done");
        assert_eq!(
            serde_json::to_string(&EventKind::ClientDisconnected).unwrap(),
            "\"client_disconnected\""
        );
    }
}
