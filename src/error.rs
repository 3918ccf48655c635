//! Error types for the chat relay and client

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    /// Read, write or connect failure on a single connection. Always terminal
    /// for that connection.
    #[error("stream error: {0}")]
    Stream(#[from] io::Error),

    /// The listener could not acquire its address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The peer went away before sending its identity line.
    #[error("{peer} disconnected before sending an identity")]
    ProtocolViolation { peer: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("chat history error: {0}")]
    History(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    /// Whether this error only means the peer is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ChatError::Stream(_) | ChatError::ProtocolViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let err = ChatError::Bind {
            addr: "127.0.0.1:2000".into(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };

        assert!(err.to_string().starts_with("failed to bind 127.0.0.1:2000"));
        assert!(!err.is_disconnect());
    }

    #[test]
    fn stream_errors_are_disconnects() {
        let err: ChatError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert!(err.is_disconnect());

        let err = ChatError::ProtocolViolation { peer: "10.0.0.1:4000".into() };
        assert!(err.is_disconnect());
    }
}
