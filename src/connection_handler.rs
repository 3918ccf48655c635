use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use tracing::{debug, info};

use crate::{
    broadcaster::Broadcaster,
    connection::{Connection, LineReader},
    error::{ChatError, Result},
    message::{ClientIdentity, Message},
};

pub type HandlerId = usize;

/// Lifecycle of a `ConnectionHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// Registered, join announcement in flight.
    Connecting,
    /// Read loop running.
    Active,
    /// Teardown started; deregistered or about to be.
    Closing,
    Closed,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            0 => State::Connecting,
            1 => State::Active,
            2 => State::Closing,
            _ => State::Closed,
        }
    }
}

/// Server side of one chat participant.
#[derive(Debug)]
pub struct ConnectionHandler {
    id: HandlerId,
    identity: ClientIdentity,
    connection: Connection,
    state: AtomicU8,
}

impl ConnectionHandler {
    pub fn new(id: HandlerId, identity: ClientIdentity, connection: Connection) -> Self {
        Self {
            id,
            identity,
            connection,
            state: AtomicU8::new(State::Connecting as u8),
        }
    }

    /// Reads the peer's identity line, registers the handler and announces
    /// the join to everyone else.
    ///
    /// If the peer goes away before naming itself the connection is closed
    /// and nothing is registered or announced.
    pub fn connect(
        id: HandlerId,
        connection: Connection,
        reader: &mut LineReader,
        broadcaster: &Broadcaster,
    ) -> Result<Arc<Self>> {
        let identity = match reader.read_line() {
            Ok(Some(line)) => ClientIdentity::from(line),
            Ok(None) => {
                connection.close();
                return Err(ChatError::ProtocolViolation {
                    peer: connection.peer().to_owned(),
                });
            }
            Err(e) => {
                connection.close();
                return Err(e.into());
            }
        };

        let handler = Arc::new(Self::new(id, identity, connection));

        broadcaster.registry().add(Arc::clone(&handler));
        info!(
            "{} joined as {:?} ({} online)",
            handler.peer(),
            handler.identity.as_str(),
            broadcaster.registry().len(),
        );
        broadcaster.broadcast(&Message::joined(&handler.identity));

        // Fails only if a write to us already failed during the announcement;
        // `run` then returns immediately.
        let _ = handler.transition(State::Connecting, State::Active);

        Ok(handler)
    }

    /// Forwards every line read from the peer until the stream ends or fails,
    /// then tears the handler down.
    pub fn run(&self, mut reader: LineReader, broadcaster: &Broadcaster) {
        while self.is_active() {
            match reader.read_line() {
                Ok(Some(line)) if self.is_active() => {
                    broadcaster.broadcast(&Message::chat(self.identity.clone(), line));
                }
                Ok(Some(_)) => break,
                Ok(None) => {
                    debug!("{} ({}) disconnected", self.identity, self.peer());
                    break;
                }
                Err(e) => {
                    debug!("{} ({}) read failed: {}", self.identity, self.peer(), e);
                    break;
                }
            }
        }

        self.close(broadcaster);
    }

    /// Writes one line to this peer.
    pub fn send(&self, text: &str) -> Result<()> {
        self.connection.write_line(text).map_err(ChatError::from)
    }

    /// Deregisters, announces the departure and closes the stream.
    ///
    /// Only the first caller does anything; returns whether this call was it.
    pub fn close(&self, broadcaster: &Broadcaster) -> bool {
        let started = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
            match State::from(s) {
                State::Closing | State::Closed => None,
                _ => Some(State::Closing as u8),
            }
        });
        if started.is_err() {
            return false;
        }

        broadcaster.registry().remove(self.id);
        info!(
            "{} ({}) left the chat ({} online)",
            self.identity,
            self.peer(),
            broadcaster.registry().len(),
        );
        broadcaster.broadcast(&Message::left(&self.identity));

        self.connection.close();
        self.state.store(State::Closed as u8, Ordering::Release);

        true
    }

    /// Closes the stream without going through `close`. A read loop blocked
    /// on it wakes up with an error and runs the normal teardown.
    pub fn disconnect(&self) {
        self.connection.close();
    }

    fn transition(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn peer(&self) -> &str {
        self.connection.peer()
    }

    pub fn state(&self) -> State {
        State::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == State::Active
    }
}
