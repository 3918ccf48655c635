use std::sync::Arc;

use tracing::{debug, warn};

use crate::{message::Message, registry::Registry};

/// Delivers messages to every registered `ConnectionHandler` except the one
/// that sent them.
#[derive(Debug, Default)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Best effort: a recipient whose write fails is closed (which deregisters
    /// it and announces its departure), and delivery carries on with the rest.
    ///
    /// Returns the number of recipients the line was written to.
    pub fn broadcast(&self, message: &Message) -> usize {
        debug!("<{}> {}", message.origin(), message.text());

        let mut delivered = 0;

        for handler in self.registry.snapshot() {
            if handler.identity() == message.origin() {
                continue;
            }

            match handler.send(message.text()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!("While sending to {} ({}): {}", handler.identity(), handler.peer(), err);
                    handler.close(self);
                }
            }
        }

        delivered
    }
}
