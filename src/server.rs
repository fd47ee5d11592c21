use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info};

use crate::journal::{EventDetail, EventKind};
use crate::recorder::Recorder;
use crate::session::{Session, SessionOptions};
use crate::snapshot::{PeerStatus, SERVER_ID};
use crate::thread_pool::ThreadPool;
use crate::Result;

/// the port the server listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 2121;

// pending connections the kernel queues for us
const LISTEN_BACKLOG: i32 = 128;

/// A TCP file-transfer server.
/// It accepts connections on a [`SocketAddr`](https://doc.rust-lang.org/std/net/enum.SocketAddr.html)
/// and runs a [`Session`] for each of them on the [`ThreadPool`].
///
/// Each session receives a clone of the [`Recorder`], which journals its events and publishes
/// the peer's status.
///
/// # Example
/// Serve the current directory on port 2121, one thread per connection
/// ```rust
/// use std::path::Path;
/// use mftp::{DiskRecorder, FtpServer, NaiveThreadPool, SessionOptions, ThreadPool};
/// # fn main() -> mftp::Result<()> {
/// let recorder = DiskRecorder::open(Path::new("."))?;
/// let pool = NaiveThreadPool::new(0)?;
/// let server = FtpServer::bind("0.0.0.0:2121".parse()?, recorder, pool, SessionOptions::new("."))?;
/// let shutdown = server.shutdown_handle()?;
/// // shutdown.shutdown() from another thread makes run() return
/// server.run()?;
/// # Ok(())
/// # }
/// ```
pub struct FtpServer<C: Recorder, P: ThreadPool> {
    listener: TcpListener,
    recorder: C,
    pool: P,
    options: SessionOptions,
    running: Arc<AtomicBool>,
}

impl<C: Recorder, P: ThreadPool> FtpServer<C, P> {
    /// opens the listening socket on `addr` and seeds the server's own `running` entry in the
    /// state snapshot.
    ///
    /// # Errors
    /// returns [`FtpError::Io`] if the socket could not be created, bound or put into listening
    /// mode. This is the one fatal error of the server.
    ///
    /// [`FtpError::Io`]: crate::FtpError::Io
    pub fn bind(addr: SocketAddr, recorder: C, pool: P, options: SessionOptions) -> Result<Self> {
        let listener = listen(addr)?;
        info!("listening on {}", listener.local_addr()?);

        recorder.set(SERVER_ID, PeerStatus::Running);

        Ok(FtpServer {
            listener,
            recorder,
            pool,
            options,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// the address the server is actually listening on (useful after binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// a handle that stops the accept loop from any thread
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            running: self.running.clone(),
            wake_addr: connectable(self.listener.local_addr()?),
        })
    }

    /// accepts connections until shutdown is requested, handing each one to the pool.
    ///
    /// Accept failures are logged and skipped, an interrupted accept ends the loop. Sessions
    /// still running when the loop ends are not waited for.
    pub fn run(self) -> Result<()> {
        for stream in self.listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                debug!("shutdown requested, leaving accept loop");
                break;
            }
            match stream {
                Ok(stream) => self.serve(stream),
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    info!("accept interrupted, shutting down");
                    break;
                }
                Err(e) => error!("accept() failed: {}", e),
            }
        }
        info!("server exiting");
        Ok(())
    }

    /// prepares an accepted connection and spawns its session
    fn serve(&self, stream: TcpStream) {
        let peer = match stream.peer_addr() {
            Ok(addr) => peer_identity(addr),
            Err(e) => {
                error!("could not read peer address: {}", e);
                return;
            }
        };
        info!("Accepted connection from {}", peer);

        let reader = match prepare(&stream, &self.options) {
            Ok(reader) => reader,
            Err(e) => {
                error!("could not set up connection from {}: {}", peer, e);
                self.recorder.emit(EventKind::Error, &EventDetail::error(&peer, "setup_failed"));
                return;
            }
        };

        let session = Session::new(reader, stream, peer, self.recorder.clone(), self.options.clone());
        self.pool.spawn(move || session.run());
    }
}

/// Stops a running [`FtpServer`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// asks the accept loop to exit. A blocked `accept` is woken up by a throw-away connection
    /// to the listener, which is then dropped unserved.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            if let Err(e) = TcpStream::connect(self.wake_addr) {
                debug!("could not wake the accept loop: {}", e);
            }
        }
    }

    /// true until [`shutdown`](Self::shutdown) has been called
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// opens a listening TCP socket with address reuse enabled
fn listen(addr: SocketAddr) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

/// applies the idle timeout and clones the socket so it can be read and written independently
fn prepare(stream: &TcpStream, options: &SessionOptions) -> std::io::Result<TcpStream> {
    stream.set_read_timeout(options.idle_timeout)?;
    stream.try_clone()
}

/// the identity of a peer in the journal and the snapshot: its IP address without the port
fn peer_identity(addr: SocketAddr) -> String {
    match addr {
        SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.ip().to_string(),
        },
        SocketAddr::V4(v4) => v4.ip().to_string(),
    }
}

/// a wildcard listen address cannot be connected to, use loopback instead
fn connectable(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(v4) if v4.ip().is_unspecified() => {
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), v4.port())
        }
        SocketAddr::V6(v6) if v6.ip().is_unspecified() => {
            SocketAddr::new(Ipv6Addr::LOCALHOST.into(), v6.port())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_identity_drops_port() {
        assert_eq!(peer_identity("10.1.2.3:5555".parse().unwrap()), "10.1.2.3");
        assert_eq!(peer_identity("[::ffff:10.1.2.3]:5555".parse().unwrap()), "10.1.2.3");
        assert_eq!(peer_identity("[::1]:5555".parse().unwrap()), "::1");
    }

    #[test]
    fn wildcard_is_woken_on_loopback() {
        assert_eq!(
            connectable("0.0.0.0:2121".parse().unwrap()),
            "127.0.0.1:2121".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            connectable("10.0.0.2:2121".parse().unwrap()),
            "10.0.0.2:2121".parse::<SocketAddr>().unwrap()
        );
    }
}
