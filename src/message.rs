use std::{fmt, sync::Arc};

/// Prefix of lines generated by the relay itself.
pub const SERVER: &str = "SERVER";

/// The display label a peer declares on its first line.
///
/// Neither uniqueness nor content is checked; an empty first line gives an
/// empty identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(Arc<str>);

impl ClientIdentity {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientIdentity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClientIdentity {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A line on its way through the relay.
///
/// Handlers whose identity equals `origin` are skipped on delivery. Join and
/// leave announcements use the subject as origin, so nobody is told about
/// their own arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    origin: ClientIdentity,
    text: String,
}

impl Message {
    /// A chat line, forwarded verbatim.
    pub fn chat(origin: ClientIdentity, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
        }
    }

    pub fn joined(identity: &ClientIdentity) -> Self {
        Self {
            origin: identity.clone(),
            text: format!("{SERVER}: {identity} has entered the chat"),
        }
    }

    pub fn left(identity: &ClientIdentity) -> Self {
        Self {
            origin: identity.clone(),
            text: format!("{SERVER}: {identity} has left the chat"),
        }
    }

    pub fn origin(&self) -> &ClientIdentity {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
