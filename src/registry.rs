use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    connection_handler::{ConnectionHandler, HandlerId},
    message::ClientIdentity,
};

/// The set of handlers that are currently active, in join order.
///
/// Keyed by handler id rather than identity, since two peers may pick the
/// same name. Every operation takes the same lock, so a broadcast iterating a
/// snapshot never sees a handler half-removed.
#[derive(Debug, Default)]
pub struct Registry {
    handlers: Mutex<Vec<Arc<ConnectionHandler>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<ConnectionHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, handler: Arc<ConnectionHandler>) {
        self.lock().push(handler);
    }

    /// Removes the handler with `id`. Returns `false` if it was not present.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.lock();

        match handlers.iter().position(|h| h.id() == id) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// A copy of the current members, safe to iterate without the lock.
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandler>> {
        self.lock().clone()
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.lock().iter().any(|h| h.id() == id)
    }

    pub fn identities(&self) -> Vec<ClientIdentity> {
        self.lock().iter().map(|h| h.identity().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::testing::memory_connection;

    fn handler(id: HandlerId, name: &str) -> Arc<ConnectionHandler> {
        let (conn, _, _) = memory_connection(name);
        Arc::new(ConnectionHandler::new(id, name.into(), conn))
    }

    #[test]
    fn joins_minus_leaves() {
        let registry = Registry::new();

        for id in 0..5 {
            registry.add(handler(id, &format!("user{id}")));
        }
        for id in [1, 3] {
            assert!(registry.remove(id));
        }

        assert_eq!(registry.len(), 3);
        let names: Vec<_> = registry
            .identities()
            .iter()
            .map(|i| i.as_str().to_owned())
            .collect();
        assert_eq!(names, ["user0", "user2", "user4"]);
    }

    #[test]
    fn remove_absent_is_noop() {
        let registry = Registry::new();
        registry.add(handler(7, "bob"));

        assert!(registry.remove(7));
        assert!(!registry.remove(7));
        assert!(!registry.remove(42));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_identities_are_distinct_members() {
        let registry = Registry::new();
        registry.add(handler(1, "alice"));
        registry.add(handler(2, "alice"));

        assert!(registry.remove(1));
        assert!(registry.contains(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn concurrent_joins_and_leaves() {
        let registry = Arc::new(Registry::new());

        let workers: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..50 {
                        let id = t * 100 + i;
                        registry.add(handler(id, "user"));
                        let _ = registry.snapshot();
                        if i % 2 == 0 {
                            assert!(registry.remove(id));
                        }
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(registry.len(), 8 * 25);
        assert_eq!(registry.snapshot().len(), registry.len());
    }
}
