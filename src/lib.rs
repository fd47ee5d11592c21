#![deny(missing_docs)]
//! A multithreaded mini file-transfer server that speaks a tiny FTP-like text protocol,
//! journals every protocol event, and publishes a live snapshot of per-peer state.
//!
//! This crate provides the [`FtpServer`] itself, an [`FtpClient`], and the [`mftp-server`]
//! and [`mftp-client`] executables built on top of them.
//! Clients talk to the server over plain TCP using line oriented ASCII commands, with raw
//! binary payloads embedded in uploads and downloads.
//!
//! ## Supported Commands
//! - `HELLO [name]` is answered with `200 WELCOME <name>`
//! - `LIST` returns a fixed directory listing stub
//! - `PUT <filename> <size>` uploads `size` bytes, which follow the `150 Ready to receive` reply
//! - `GET <filename>` downloads a file, announced with a `SIZE <n>` line
//! - `QUIT` ends the session
//!
//! See [`Command`] and [`Reply`] for the exact syntax and reply texts.
//!
//! ## Sessions
//! Every accepted connection is driven by a [`Session`], the per-connection protocol state
//! machine, on a worker of a [`ThreadPool`]. By default each connection gets its own thread
//! ([`NaiveThreadPool`]).
//!
//! ## Event Journal and State Snapshot
//! A [`Recorder`] observes every session. The [`DiskRecorder`] keeps two files in the server's
//! working directory:
//!
//! - `events.log`, an append-only journal with one JSON record per line, e.g.
//! `{"ts":"2024-05-01T10:00:00.123Z","type":"put_done","detail":{"ip":"10.0.0.7","file":"a.bin","size":5}}`
//! - `state.json`, the latest status of every peer, e.g.
//! `{"nodes":[{"ip":"SERVER","state":"running"},{"ip":"10.0.0.7","state":"connected"}]}`.
//! It is replaced atomically (write to `state.json.tmp`, then rename) on every change, so a
//! reader never sees a partial document.
//!
//! Both files are guarded by a single lock, which keeps each status change ordered after the
//! events that caused it.
//!
//! [`mftp-server`]: ../mftp_server/index.html
//! [`mftp-client`]: ../mftp_client/index.html

pub use client::FtpClient;
pub use command::{Command, Reply};
pub use error::{FtpError, Result};
pub use journal::{EventDetail, EventKind, EventRecord};
pub use recorder::{DiskRecorder, MemoryRecorder, Recorder};
pub use server::{FtpServer, ShutdownHandle, DEFAULT_PORT};
pub use session::{Session, SessionOptions};
pub use snapshot::{PeerStatus, SnapshotDocument, SERVER_ID};
pub use thread_pool::{NaiveThreadPool, RayonThreadPool, SharedQueueThreadPool, ThreadPool};

pub mod clock;
mod client;
pub mod command;
mod error;
pub mod framed;
pub mod journal;
mod recorder;
mod server;
pub mod session;
pub mod snapshot;
pub mod thread_pool;
