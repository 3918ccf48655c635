use std::{
    fmt,
    io::{self, BufRead, BufReader, Read, Write},
    net::{Shutdown, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    },
};

use tracing::debug;

/// Something that can tear down the underlying stream, unblocking any reader
/// that is parked on it.
pub trait Close: Send + Sync {
    fn close(&self) -> io::Result<()>;
}

impl Close for TcpStream {
    fn close(&self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            res => res,
        }
    }
}

/// Write half of a line-oriented stream.
///
/// Every `write_line` holds the writer lock for the whole line and flushes
/// before returning, so two threads writing to the same `Connection` never
/// interleave partial lines.
pub struct Connection {
    peer: String,
    writer: Mutex<Box<dyn Write + Send>>,
    closer: Box<dyn Close>,
    closed: AtomicBool,
}

impl Connection {
    pub fn new<W, C>(peer: impl Into<String>, writer: W, closer: C) -> Self
    where
        W: Write + Send + 'static,
        C: Close + 'static,
    {
        Self {
            peer: peer.into(),
            writer: Mutex::new(Box::new(writer)),
            closer: Box::new(closer),
            closed: AtomicBool::new(false),
        }
    }

    /// Splits a `TcpStream` into a `Connection` and the `LineReader` for its
    /// read half.
    pub fn from_tcp(stream: TcpStream) -> io::Result<(Self, LineReader)> {
        let peer = stream.peer_addr()?.to_string();
        let reader = LineReader::new(stream.try_clone()?);
        let closer = stream.try_clone()?;

        Ok((Self::new(peer, stream, closer), reader))
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Writes `line` followed by `\n` and flushes.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed",
            ));
        }

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(buf.as_bytes())?;
        writer.flush()
    }

    /// Closes the stream. Returns `true` only for the call that actually
    /// closed it.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Err(err) = self.closer.close() {
            debug!("Closing {}: {}", self.peer, err);
        }

        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Read half of a line-oriented stream. Owned by whoever runs the read loop.
pub struct LineReader {
    inner: BufReader<Box<dyn Read + Send>>,
}

impl LineReader {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            inner: BufReader::new(Box::new(reader)),
        }
    }

    /// Reads one line without its terminator. `Ok(None)` means end of stream.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD rather than failing the stream.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();

        if self.inner.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }

        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }

        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

impl fmt::Debug for LineReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineReader").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::testing::{memory_connection, FailingWriter, NoopCloser};

    #[test]
    fn write_line_appends_terminator() {
        let (conn, out, _) = memory_connection("peer");

        conn.write_line("alice: hi").unwrap();
        conn.write_line("").unwrap();

        assert_eq!(out.contents(), "alice: hi\n\n");
    }

    #[test]
    fn read_line_strips_terminators() {
        let mut reader = LineReader::new(Cursor::new(b"alice\r\nhello\n\nlast".to_vec()));

        assert_eq!(reader.read_line().unwrap().as_deref(), Some("alice"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("hello"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("last"));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn read_line_tolerates_invalid_utf8() {
        let mut reader = LineReader::new(Cursor::new(b"alice: caf\xe9\nnext\n".to_vec()));

        assert_eq!(
            reader.read_line().unwrap().as_deref(),
            Some("alice: caf\u{fffd}")
        );
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("next"));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn close_is_one_shot() {
        let (conn, _, closes) = memory_connection("peer");

        assert!(conn.close());
        assert!(!conn.close());
        assert_eq!(closes.count(), 1);
        assert!(conn.is_closed());
    }

    #[test]
    fn write_after_close_fails() {
        let (conn, out, _) = memory_connection("peer");
        conn.close();

        let err = conn.write_line("late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn write_errors_surface() {
        let conn = Connection::new("peer", FailingWriter, NoopCloser);
        assert!(conn.write_line("hello").is_err());
    }
}
