use std::io::{BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::framed::{read_line, recv_exact, send_all, send_exact, Line};
use crate::{FtpError, Result};

// replies are short, anything longer than this is not a reply
const MAX_REPLY_LINE: usize = 4096;

/// `FtpClient` contains the functionality for communicating with an [`FtpServer`]
///
/// [`FtpServer`]: crate::FtpServer
pub struct FtpClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    line: Vec<u8>,
}

impl FtpClient {
    /// creates a client and establishes a socket connection to the server at the given `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let tcp_reader = TcpStream::connect(addr)?;
        let tcp_writer = tcp_reader.try_clone()?;

        Ok(FtpClient {
            reader: BufReader::new(tcp_reader),
            writer: tcp_writer,
            line: Vec::new(),
        })
    }

    /// sends `HELLO <name>` (or a bare `HELLO`) and returns the welcome reply
    pub fn hello(&mut self, name: Option<&str>) -> Result<String> {
        match name {
            Some(name) => self.send_line(&format!("HELLO {}", name))?,
            None => self.send_line("HELLO")?,
        }
        self.expect_reply("200")
    }

    /// requests the directory listing and returns the file names it contains
    pub fn list(&mut self) -> Result<Vec<String>> {
        self.send_line("LIST")?;
        self.expect_reply("150")?;
        let mut names = vec![];
        loop {
            let line = self.read_reply()?;
            if line.starts_with("226") {
                return Ok(names);
            }
            names.push(line);
        }
    }

    /// uploads `data` into the server side file `remote`
    pub fn put(&mut self, remote: &str, data: &[u8]) -> Result<()> {
        self.put_from(remote, &mut &data[..], data.len() as u64)
    }

    /// uploads `size` bytes read from `src` into the server side file `remote`.
    ///
    /// # Errors
    /// returns [`FtpError::Server`] if the server refuses the upload or reports it incomplete
    pub fn put_from<R: Read>(&mut self, remote: &str, src: &mut R, size: u64) -> Result<()> {
        self.send_line(&format!("PUT {} {}", remote, size))?;
        self.expect_reply("150")?;
        let sent = send_exact(src, size, &mut self.writer)?;
        if sent != size {
            return Err(FtpError::StringErr(format!(
                "local source ended after {} of {} bytes",
                sent, size
            )));
        }
        self.expect_reply("226")?;
        Ok(())
    }

    /// downloads the server side file `remote` into `sink`, returning its size
    ///
    /// # Errors
    /// returns [`FtpError::Server`] if the file does not exist, and
    /// [`FtpError::ConnectionClosed`] if the payload ends early
    pub fn get<W: Write>(&mut self, remote: &str, sink: &mut W) -> Result<u64> {
        self.get_with(remote, |_| Ok(sink))
    }

    /// like [`get`](Self::get), but the sink is only created by `open` once the server has
    /// announced the payload with `SIZE <n>`. A refused download never calls `open`.
    pub fn get_with<W, F>(&mut self, remote: &str, open: F) -> Result<u64>
    where
        W: Write,
        F: FnOnce(u64) -> Result<W>,
    {
        self.send_line(&format!("GET {}", remote))?;
        let header = self.read_reply()?;
        let size = header
            .strip_prefix("SIZE ")
            .ok_or_else(|| FtpError::Server(header.clone()))?
            .trim()
            .parse::<u64>()
            .map_err(|_| FtpError::Parsing(format!("bad SIZE header: {}", header)))?;

        let mut sink = open(size)?;
        let received = recv_exact(&mut self.reader, size, &mut sink)?;
        if received != size {
            return Err(FtpError::ConnectionClosed);
        }
        self.expect_reply("226")?;
        Ok(size)
    }

    /// sends `QUIT` and returns the goodbye reply. The connection is closed afterwards
    pub fn quit(mut self) -> Result<String> {
        self.send_line("QUIT")?;
        self.expect_reply("221")
    }

    /// sends a raw command line. A `\n` terminator is appended
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        debug!("sending {:?}", line);
        send_all(&mut self.writer, format!("{}\n", line).as_bytes())?;
        Ok(())
    }

    /// sends raw bytes, e.g. a payload following a hand written `PUT` line
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        send_all(&mut self.writer, bytes)?;
        Ok(())
    }

    /// reads one reply line, without its `\r\n`
    pub fn read_reply(&mut self) -> Result<String> {
        match read_line(&mut self.reader, &mut self.line, MAX_REPLY_LINE)? {
            Line::Text(line) => {
                debug!("received {:?}", line);
                Ok(line)
            }
            Line::TooLong => Err(FtpError::Parsing("reply line too long".to_string())),
            Line::Eof => Err(FtpError::ConnectionClosed),
        }
    }

    /// reads exactly `n` raw bytes
    pub fn read_raw(&mut self, n: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(n as usize);
        if recv_exact(&mut self.reader, n, &mut buf)? != n {
            return Err(FtpError::ConnectionClosed);
        }
        Ok(buf)
    }

    /// reads a reply and checks that it starts with `code`
    fn expect_reply(&mut self, code: &str) -> Result<String> {
        let line = self.read_reply()?;
        if line.starts_with(code) {
            Ok(line)
        } else {
            Err(FtpError::Server(line))
        }
    }

    /// shuts down the writing half, signalling end-of-stream to the server
    pub fn close_write(&self) -> Result<()> {
        self.writer.shutdown(std::net::Shutdown::Write)?;
        Ok(())
    }
}

