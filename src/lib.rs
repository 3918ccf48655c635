//! Line-oriented chat relay.
//!
//! A [`Listener`] accepts TCP connections and gives each one a
//! [`ConnectionHandler`] on its own thread. The first line a peer sends is its
//! identity; every later line is handed to the [`Broadcaster`], which writes it
//! to every other member of the [`Registry`].
//!
//! The [`client`] module holds the other end: a [`Client`] that sends a
//! username and relays lines to a [`Display`], with [`ChatHistory`] as an
//! optional on-disk log.

pub mod broadcaster;
pub mod client;
pub mod config;
pub mod connection;
pub mod connection_handler;
pub mod error;
pub mod history;
pub mod listener;
pub mod message;
pub mod registry;

#[cfg(test)]
mod testing;

pub use broadcaster::Broadcaster;
pub use client::{Client, Display, MessageObserver};
pub use config::{ClientConfig, ServerConfig};
pub use connection::{Close, Connection, LineReader};
pub use connection_handler::{ConnectionHandler, HandlerId, State};
pub use error::{ChatError, Result};
pub use history::{ChatHistory, ChatMessage};
pub use listener::{Listener, StopHandle};
pub use message::{ClientIdentity, Message};
pub use registry::Registry;
