//! Chat history persisted as a JSON array next to the client.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    client::MessageObserver,
    error::{ChatError, Result},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// `[HH:MM:SS] sender: message`, in local time.
    pub fn render(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.with_timezone(&Local).format("%H:%M:%S"),
            self.sender,
            self.message,
        )
    }
}

/// Every message seen by one client, rewritten to disk after each addition.
#[derive(Debug)]
pub struct ChatHistory {
    path: PathBuf,
    messages: Mutex<Vec<ChatMessage>>,
}

impl ChatHistory {
    /// Loads `path` if it exists. A missing file is an empty history; an
    /// unreadable one is logged and also treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let messages = match Self::load(&path) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Starting with empty history: {}", e);
                Vec::new()
            }
        };

        Self {
            path,
            messages: Mutex::new(messages),
        }
    }

    pub fn load(path: &Path) -> Result<Vec<ChatMessage>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            ChatError::History(format!("failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            ChatError::History(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_message(&self, sender: &str, message: &str) -> Result<()> {
        let mut messages = self.lock();
        messages.push(ChatMessage::new(sender, message));
        self.write(&messages)
    }

    fn write(&self, messages: &[ChatMessage]) -> Result<()> {
        let contents = serde_json::to_string_pretty(messages)
            .map_err(|e| ChatError::History(format!("failed to serialize history: {}", e)))?;

        fs::write(&self.path, contents).map_err(|e| {
            ChatError::History(format!("failed to write {}: {}", self.path.display(), e))
        })
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageObserver for ChatHistory {
    fn on_message_observed(&self, origin: &str, text: &str) {
        if let Err(e) = self.add_message(origin, text) {
            warn!("Couldn't record message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = ChatHistory::open(dir.path().join("chat_history.json"));

        assert!(history.is_empty());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");

        let history = ChatHistory::open(&path);
        history.add_message("alice", "hello").unwrap();
        history.on_message_observed("Group", "bob: hi alice");

        let reopened = ChatHistory::open(&path);
        let messages = reopened.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, "alice");
        assert_eq!(messages[0].message, "hello");
        assert_eq!(messages[1].sender, "Group");
        assert_eq!(messages[1].message, "bob: hi alice");
        assert_eq!(messages, history.messages());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(ChatHistory::load(&path), Err(ChatError::History(_))));
        assert!(ChatHistory::open(&path).is_empty());
    }

    #[test]
    fn write_failures_do_not_reach_the_observer_caller() {
        let dir = tempfile::tempdir().unwrap();
        // A directory can't be written as a file.
        let history = ChatHistory::open(dir.path());

        assert!(history.add_message("alice", "hello").is_err());
        history.on_message_observed("alice", "still fine");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn render_format() {
        let msg = ChatMessage::new("alice", "hello");
        let rendered = msg.render();

        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] alice: hello"));
    }
}
