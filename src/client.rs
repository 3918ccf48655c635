//! Outbound side of the chat: connects to a relay, announces the username and
//! pumps lines between the socket and a display.

use std::{
    io,
    net::TcpStream,
    sync::Arc,
    thread::{self, JoinHandle},
};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    connection::{Connection, LineReader},
    error::Result,
};

/// Origin recorded for lines that arrive from the relay.
pub const GROUP: &str = "Group";

/// Where received and locally echoed lines are shown.
pub trait Display: Send + Sync {
    fn on_line_received(&self, line: &str);

    /// The relay went away or the connection was closed.
    fn on_disconnected(&self) {}
}

/// Side channel that sees every sent and every received line. Must not fail
/// the caller; implementations deal with their own errors.
pub trait MessageObserver: Send + Sync {
    fn on_message_observed(&self, origin: &str, text: &str);
}

pub struct Client {
    username: String,
    connection: Connection,
    display: Arc<dyn Display>,
    observer: Option<Arc<dyn MessageObserver>>,
}

impl Client {
    pub fn new(
        username: impl Into<String>,
        connection: Connection,
        display: Arc<dyn Display>,
        observer: Option<Arc<dyn MessageObserver>>,
    ) -> Self {
        Self {
            username: username.into(),
            connection,
            display,
            observer,
        }
    }

    /// Connects to the relay and sends the username as the identity line.
    pub fn connect(
        config: &ClientConfig,
        display: Arc<dyn Display>,
        observer: Option<Arc<dyn MessageObserver>>,
    ) -> Result<(Self, LineReader)> {
        let stream = TcpStream::connect(config.address())?;
        let (connection, reader) = Connection::from_tcp(stream)?;
        info!("Connected to {}", connection.peer());

        let client = Self::new(config.username.clone(), connection, display, observer);
        client.connection.write_line(&client.username)?;

        Ok((client, reader))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Sends `text` as `"{username}: {text}"` and echoes it locally. Empty
    /// input is ignored.
    pub fn send(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.connection.write_line(&format!("{}: {}", self.username, text)) {
            self.close();
            return Err(e.into());
        }

        self.display
            .on_line_received(&format!("[{}] {}: {}", timestamp(), self.username, text));
        self.observe(&self.username, text);

        Ok(())
    }

    /// Runs `receive` on its own thread.
    pub fn listen(self: &Arc<Self>, reader: LineReader) -> io::Result<JoinHandle<()>> {
        let client = Arc::clone(self);

        thread::Builder::new()
            .name("chat-listener".into())
            .spawn(move || client.receive(reader))
    }

    /// Shows every line from the relay until the stream ends.
    pub fn receive(&self, mut reader: LineReader) {
        loop {
            match reader.read_line() {
                Ok(Some(line)) => {
                    self.display
                        .on_line_received(&format!("[{}] {}", timestamp(), line));
                    self.observe(GROUP, &line);
                }
                Ok(None) => {
                    debug!("Relay closed the connection");
                    break;
                }
                Err(e) => {
                    if !self.connection.is_closed() {
                        warn!("Reading from {}: {}", self.connection.peer(), e);
                    }
                    break;
                }
            }
        }

        self.close();
        self.display.on_disconnected();
    }

    pub fn close(&self) {
        self.connection.close();
    }

    fn observe(&self, origin: &str, text: &str) {
        if let Some(observer) = &self.observer {
            observer.on_message_observed(origin, text);
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
