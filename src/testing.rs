//! In-memory stream doubles shared by the unit tests.

use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use crate::connection::{Close, Connection};

/// A writer whose bytes can be inspected after being handed to a `Connection`.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Fails every write, like a socket whose peer has gone.
pub struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::ErrorKind::BrokenPipe.into())
    }
}

#[derive(Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Close for CloseCounter {
    fn close(&self) -> io::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct NoopCloser;

impl Close for NoopCloser {
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

pub fn memory_connection(peer: &str) -> (Connection, SharedBuffer, CloseCounter) {
    let out = SharedBuffer::default();
    let closes = CloseCounter::default();
    let conn = Connection::new(peer, out.clone(), closes.clone());

    (conn, out, closes)
}

pub fn failing_connection(peer: &str) -> (Connection, CloseCounter) {
    let closes = CloseCounter::default();
    (Connection::new(peer, FailingWriter, closes.clone()), closes)
}
