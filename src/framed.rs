//! Full-read / full-write helpers over a connected byte stream, plus the line reader used
//! by the protocol engine.
//!
//! Commands are newline terminated text, but a `PUT` is followed by raw payload bytes on the
//! same stream. [`read_line`] therefore pulls from a [`BufRead`] and never consumes a byte past
//! the terminating `\n`, so whatever follows is still buffered for [`recv_exact`].
use std::io::{self, BufRead, ErrorKind, Read, Write};

// size of the scratch buffer used when moving payload bytes
const CHUNK_SIZE: usize = 64 * 1024;

/// The outcome of reading one line from the stream
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    /// a complete line with `\r` characters removed and without the `\n` terminator
    Text(String),
    /// the line exceeded the length limit. The rest of it was consumed and discarded
    TooLong,
    /// the stream ended. Any partially accumulated line was discarded
    Eof,
}

/// writes every byte of `bytes` to `w`, retrying short and interrupted writes, then flushes.
///
/// # Errors
/// returns an error of kind [`ErrorKind::WriteZero`] if the writer stops accepting bytes
pub fn send_all<W: Write + ?Sized>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    let mut sent = 0;
    while sent < bytes.len() {
        match w.write(&bytes[sent..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    format!("peer stopped accepting data after {} of {} bytes", sent, bytes.len()),
                ))
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    w.flush()
}

/// receives exactly `n` bytes from `r`, writing each chunk into `sink` as it arrives.
///
/// Returns the number of bytes actually received, which is less than `n` if the peer closed
/// the stream early. Deciding whether a short count is fatal is up to the caller.
pub fn recv_exact<R, W>(r: &mut R, n: u64, sink: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut received = 0_u64;
    while received < n {
        let want = (n - received).min(CHUNK_SIZE as u64) as usize;
        match r.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(len) => {
                sink.write_all(&buf[..len])?;
                received += len as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    sink.flush()?;
    Ok(received)
}

/// copies at most `n` bytes from `src` to `w`.
///
/// Returns how many bytes were read from `src`. A count below `n` means the source ran dry
/// before `n` bytes were produced (a file that shrank after its size was announced).
pub fn send_exact<R, W>(src: &mut R, n: u64, w: &mut W) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent = 0_u64;
    while sent < n {
        let want = (n - sent).min(CHUNK_SIZE as u64) as usize;
        let len = match src.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        send_all(w, &buf[..len])?;
        sent += len as u64;
    }
    Ok(sent)
}

/// reads a single line from `r`, using `buf` as the accumulation buffer.
///
/// `\r` is treated as filler and `\n` terminates the line. When more than `max_len` bytes
/// accumulate, the remainder of the line is skipped and [`Line::TooLong`] is returned.
/// Invalid UTF-8 is replaced rather than rejected; the command parser only matches ASCII.
pub fn read_line<R: BufRead + ?Sized>(r: &mut R, buf: &mut Vec<u8>, max_len: usize) -> io::Result<Line> {
    buf.clear();
    let mut overflow = false;
    loop {
        let available = match r.fill_buf() {
            Ok(available) => available,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            buf.clear();
            return Ok(Line::Eof);
        }

        let mut used = 0;
        let mut done = false;
        for &byte in available {
            used += 1;
            match byte {
                b'\n' => {
                    done = true;
                    break;
                }
                b'\r' => {}
                _ if overflow => {}
                _ => {
                    if buf.len() >= max_len {
                        overflow = true;
                        buf.clear();
                    } else {
                        buf.push(byte);
                    }
                }
            }
        }
        r.consume(used);

        if done {
            return if overflow {
                Ok(Line::TooLong)
            } else {
                Ok(Line::Text(String::from_utf8_lossy(buf).into_owned()))
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    /// a writer that accepts at most one byte per call
    struct Trickle(Vec<u8>);

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match buf.first() {
                Some(b) => {
                    self.0.push(*b);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// a writer that has been closed by its peer
    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_all_retries_short_writes() {
        let mut w = Trickle(vec![]);
        send_all(&mut w, b"221 Goodbye\r\n").unwrap();
        assert_eq!(w.0, b"221 Goodbye\r\n");
    }

    #[test]
    fn send_all_fails_on_zero_write() {
        let err = send_all(&mut Closed, b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteZero);
    }

    #[test]
    fn read_line_strips_carriage_returns() {
        let mut r = Cursor::new(b"HELLO bob\r\nQU\rIT\n".to_vec());
        let mut buf = vec![];
        assert_eq!(read_line(&mut r, &mut buf, 64).unwrap(), Line::Text("HELLO bob".into()));
        assert_eq!(read_line(&mut r, &mut buf, 64).unwrap(), Line::Text("QUIT".into()));
        assert_eq!(read_line(&mut r, &mut buf, 64).unwrap(), Line::Eof);
    }

    #[test]
    fn read_line_discards_partial_line_at_eof() {
        let mut r = Cursor::new(b"LIS".to_vec());
        let mut buf = vec![];
        assert_eq!(read_line(&mut r, &mut buf, 64).unwrap(), Line::Eof);
        assert!(buf.is_empty());
    }

    #[test]
    fn read_line_leaves_payload_in_buffer() {
        // a tiny BufReader capacity forces the line to span several fill_buf calls
        let mut r = BufReader::with_capacity(3, Cursor::new(b"PUT a 5\nABCDE".to_vec()));
        let mut buf = vec![];
        assert_eq!(read_line(&mut r, &mut buf, 64).unwrap(), Line::Text("PUT a 5".into()));

        let mut sink = vec![];
        assert_eq!(recv_exact(&mut r, 5, &mut sink).unwrap(), 5);
        assert_eq!(sink, b"ABCDE");
    }

    #[test]
    fn read_line_reports_overlong_lines_and_recovers() {
        let mut input = vec![b'x'; 100];
        input.extend_from_slice(b"\nLIST\n");
        let mut r = Cursor::new(input);
        let mut buf = vec![];
        assert_eq!(read_line(&mut r, &mut buf, 16).unwrap(), Line::TooLong);
        assert_eq!(read_line(&mut r, &mut buf, 16).unwrap(), Line::Text("LIST".into()));
    }

    #[test]
    fn recv_exact_returns_short_count_on_early_close() {
        let mut r = Cursor::new(b"abc".to_vec());
        let mut sink = vec![];
        assert_eq!(recv_exact(&mut r, 10, &mut sink).unwrap(), 3);
        assert_eq!(sink, b"abc");
    }

    #[test]
    fn recv_exact_stops_at_n() {
        let mut r = Cursor::new(b"abcdefQUIT\n".to_vec());
        let mut sink = vec![];
        assert_eq!(recv_exact(&mut r, 6, &mut sink).unwrap(), 6);
        assert_eq!(sink, b"abcdef");
        assert_eq!(r.position(), 6);
    }

    #[test]
    fn send_exact_never_sends_more_than_announced() {
        let mut src = Cursor::new(b"1234567-grown".to_vec());
        let mut out = vec![];
        assert_eq!(send_exact(&mut src, 7, &mut out).unwrap(), 7);
        assert_eq!(out, b"1234567");
    }

    #[test]
    fn send_exact_reports_shrunk_source() {
        let mut src = Cursor::new(b"123".to_vec());
        let mut out = vec![];
        assert_eq!(send_exact(&mut src, 7, &mut out).unwrap(), 3);
    }
}
