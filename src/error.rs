use std::io;
use std::net::AddrParseError;
use thiserror::Error;

/// type alias for all operations in this crate that could fail with an [`FtpError`]
pub type Result<T> = std::result::Result<T, FtpError>;

/// The Error variants used by the server, the client and the executables.
/// Lower level errors from std and third party crates are wrapped with `#[from]`
#[derive(Debug, Error)]
pub enum FtpError {
    /// variant for errors caused by socket or file IO
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// variant for errors produced while (de)serializing journal records or the snapshot
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// an `IP:PORT` string could not be parsed
    #[error("invalid socket address: {0}")]
    Addr(#[from] AddrParseError),

    /// a command line option, address or reply could not be parsed
    #[error("{0}")]
    Parsing(String),

    /// the server answered with a reply the client did not expect
    #[error("unexpected server reply: {0}")]
    Server(String),

    /// the peer closed the connection before a complete reply was read
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// catch-all variant carrying a description of the error
    #[error("{0}")]
    StringErr(String),
}
