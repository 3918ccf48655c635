//! Defaults and validated settings for the relay and the client.

use std::path::PathBuf;

use crate::error::{ChatError, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 2000;
pub const DEFAULT_HISTORY_FILE: &str = "chat_history.json";

/// Where the relay listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint(&self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BIND_HOST, DEFAULT_PORT)
    }
}

/// Where a client connects and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// `None` disables history persistence.
    pub history: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            history: Some(PathBuf::from(DEFAULT_HISTORY_FILE)),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        validate_endpoint(&self.host, self.port)?;

        if self.username.trim().is_empty() {
            return Err(ChatError::Config("username cannot be empty".into()));
        }

        Ok(())
    }
}

fn validate_endpoint(host: &str, port: u16) -> Result<()> {
    if host.trim().is_empty() {
        return Err(ChatError::Config("host cannot be empty".into()));
    }
    if port == 0 {
        return Err(ChatError::Config(
            "port number must be between 1 and 65535".into(),
        ));
    }
    Ok(())
}
