//! The per-connection protocol engine.
//!
//! A [`Session`] owns one connection. It reads whole command lines, answers them, and switches
//! to binary framing for the payload of a `PUT` (after `150 Ready to receive`) and of a `GET`
//! (after `SIZE <n>`). Every observable step is reported to a [`Recorder`].
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::{is_plain_file_name, Command, Reply};
use crate::framed::{read_line, recv_exact, send_all, send_exact, Line};
use crate::journal::{EventDetail, EventKind};
use crate::recorder::Recorder;
use crate::snapshot::PeerStatus;

/// default upper bound on the length of a single command line
pub const DEFAULT_MAX_LINE: usize = 8 * 1024;

/// Settings that apply to every session of a server
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// directory that uploads are written to and downloads are read from
    pub root: PathBuf,
    /// lines longer than this are answered with `500 Unknown command`
    pub max_line: usize,
    /// close connections that send nothing for this long while waiting for a command
    pub idle_timeout: Option<Duration>,
}

impl SessionOptions {
    /// options serving files from `root`, with the default line limit and no idle timeout
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SessionOptions {
            root: root.into(),
            max_line: DEFAULT_MAX_LINE,
            idle_timeout: None,
        }
    }
}

/// what to do after a command was handled
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// One client connection and its protocol state
pub struct Session<R: Read, W: Write, C: Recorder> {
    reader: BufReader<R>,
    writer: W,
    peer: String,
    recorder: C,
    options: SessionOptions,
    line: Vec<u8>,
}

impl<R: Read, W: Write, C: Recorder> Session<R, W, C> {
    /// creates a session reading commands from `reader` and replying on `writer`.
    /// For a TCP connection both halves are the same socket (see [`TcpStream::try_clone`]).
    ///
    /// [`TcpStream::try_clone`]: std::net::TcpStream::try_clone
    pub fn new(reader: R, writer: W, peer: impl Into<String>, recorder: C, options: SessionOptions) -> Self {
        Session {
            reader: BufReader::new(reader),
            writer,
            peer: peer.into(),
            recorder,
            options,
            line: Vec::new(),
        }
    }

    /// runs the session until the client quits, the connection fails, or a transfer breaks.
    ///
    /// Always journals `client_connected` on entry and `client_disconnected` on exit.
    pub fn run(mut self) {
        self.recorder
            .emit(EventKind::ClientConnected, &EventDetail::peer(&self.peer));
        self.recorder.set(&self.peer, PeerStatus::Connected);

        loop {
            match self.next_command() {
                Ok(Some(cmd)) => {
                    debug!("command from {}: {:?}", self.peer, cmd);
                    match self.dispatch(cmd) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Close) => break,
                        Err(e) => {
                            debug!("connection to {} failed: {}", self.peer, e);
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) if is_timeout(&e) => {
                    info!("closing idle connection from {}", self.peer);
                    self.report_error(EventDetail::error(&self.peer, "timeout"));
                    break;
                }
                Err(e) => {
                    debug!("read from {} failed: {}", self.peer, e);
                    break;
                }
            }
        }

        self.recorder
            .emit(EventKind::ClientDisconnected, &EventDetail::peer(&self.peer));
        self.recorder.set(&self.peer, PeerStatus::Idle);
        info!("client handler exiting for {}", self.peer);
    }

    /// reads lines until a command is available. Overlong lines are answered here.
    /// `Ok(None)` means the client closed the connection.
    fn next_command(&mut self) -> io::Result<Option<Command>> {
        loop {
            match read_line(&mut self.reader, &mut self.line, self.options.max_line)? {
                Line::Text(text) => return Ok(Some(Command::parse(&text))),
                Line::TooLong => {
                    warn!("line from {} exceeds {} bytes", self.peer, self.options.max_line);
                    self.reply(&Reply::UnknownCommand)?;
                    self.recorder
                        .emit(EventKind::Error, &EventDetail::error(&self.peer, "line_too_long"));
                }
                Line::Eof => return Ok(None),
            }
        }
    }

    fn dispatch(&mut self, cmd: Command) -> io::Result<Flow> {
        match cmd {
            Command::Quit => {
                self.reply(&Reply::Goodbye)?;
                Ok(Flow::Close)
            }
            Command::Hello { name } => {
                self.reply(&Reply::Welcome(name))?;
                Ok(Flow::Continue)
            }
            Command::List => {
                self.reply(&Reply::Listing)?;
                Ok(Flow::Continue)
            }
            Command::BadPut => {
                self.reply(&Reply::PutUsage)?;
                self.report_error(EventDetail::error(&self.peer, "bad_put_cmd"));
                Ok(Flow::Continue)
            }
            Command::Put { file, size } => self.put(&file, size),
            Command::Get { file } => self.get(&file),
            Command::Unknown(line) => {
                self.reply(&Reply::UnknownCommand)?;
                // unknown commands do not change the peer's status
                self.recorder.emit(
                    EventKind::Error,
                    &EventDetail::error(&self.peer, "unknown_cmd").with_cmd(&line),
                );
                Ok(Flow::Continue)
            }
        }
    }

    /// receives `size` payload bytes into `file`
    fn put(&mut self, file: &str, size: u64) -> io::Result<Flow> {
        let path = self.options.root.join(file);
        // the target is created before `150` so a client that gets a refusal sends no payload
        let mut target = match File::create(&path) {
            Ok(target) => target,
            Err(e) => {
                warn!("could not create {:?} for {}: {}", path, self.peer, e);
                self.reply(&Reply::CannotCreate)?;
                self.report_error(EventDetail::error(&self.peer, "put_open_failed").with_file(file));
                return Ok(Flow::Continue);
            }
        };

        self.recorder
            .emit(EventKind::PutStart, &EventDetail::transfer(&self.peer, file, size));
        self.recorder.set(&self.peer, PeerStatus::Transferring);

        let received = self
            .reply(&Reply::ReadyToReceive)
            .and_then(|_| recv_exact(&mut self.reader, size, &mut target));
        drop(target);
        match received {
            Ok(n) if n == size => {
                let sent = self.reply(&Reply::TransferComplete);
                info!("received {} ({} bytes) from {}", file, size, self.peer);
                self.recorder
                    .emit(EventKind::PutDone, &EventDetail::transfer(&self.peer, file, size));
                self.recorder.set(&self.peer, PeerStatus::Connected);
                sent.map(|_| Flow::Continue)
            }
            outcome => {
                let what = match outcome {
                    Ok(n) => {
                        warn!("upload of {} from {} stopped after {} of {} bytes", file, self.peer, n, size);
                        "put_incomplete"
                    }
                    Err(e) if is_timeout(&e) => {
                        info!("upload of {} from {} went idle, closing", file, self.peer);
                        "timeout"
                    }
                    Err(e) => {
                        warn!("upload of {} from {} failed: {}", file, self.peer, e);
                        "put_incomplete"
                    }
                };
                // the peer is most likely gone, the reply is best effort
                let _ = self.reply(&Reply::TransferIncomplete);
                self.report_error(EventDetail::error(&self.peer, what).with_file(file));
                Ok(Flow::Close)
            }
        }
    }

    /// sends `file` preceded by its size
    fn get(&mut self, file: &str) -> io::Result<Flow> {
        let opened = if is_plain_file_name(file) {
            open_regular(&self.options.root.join(file))
        } else {
            None
        };
        let (mut source, size) = match opened {
            Some(opened) => opened,
            None => {
                self.reply(&Reply::FileNotFound)?;
                self.report_error(EventDetail::error(&self.peer, "get_not_found").with_file(file));
                return Ok(Flow::Continue);
            }
        };

        self.recorder
            .emit(EventKind::GetStart, &EventDetail::transfer(&self.peer, file, size));
        self.recorder.set(&self.peer, PeerStatus::Transferring);

        let sent = self
            .reply(&Reply::Size(size))
            .and_then(|_| send_exact(&mut source, size, &mut self.writer));
        match sent {
            Ok(sent) if sent == size => {
                let status = self.reply(&Reply::TransferComplete);
                info!("sent {} ({} bytes) to {}", file, size, self.peer);
                self.recorder
                    .emit(EventKind::GetDone, &EventDetail::transfer(&self.peer, file, size));
                self.recorder.set(&self.peer, PeerStatus::Connected);
                status.map(|_| Flow::Continue)
            }
            outcome => {
                match outcome {
                    Ok(sent) => warn!("{} shrank to {} bytes while sending to {}", file, sent, self.peer),
                    Err(e) => warn!("download of {} by {} failed: {}", file, self.peer, e),
                }
                self.report_error(EventDetail::error(&self.peer, "get_incomplete").with_file(file));
                Ok(Flow::Close)
            }
        }
    }

    /// journals an error event and marks the peer as failed
    fn report_error(&self, detail: EventDetail) {
        self.recorder.emit(EventKind::Error, &detail);
        self.recorder.set(&self.peer, PeerStatus::Error);
    }

    fn reply(&mut self, reply: &Reply) -> io::Result<()> {
        send_all(&mut self.writer, reply.to_wire().as_bytes())
    }
}

/// opens `path` if it is a regular file, returning it with its current length
fn open_regular(path: &Path) -> Option<(File, u64)> {
    let file = File::open(path).ok()?;
    let meta = file.metadata().ok()?;
    if meta.is_file() {
        Some((file, meta.len()))
    } else {
        None
    }
}

/// a blocking socket with a read timeout reports expiry as `WouldBlock` on unix and
/// `TimedOut` on windows
fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
