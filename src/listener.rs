use std::{
    collections::HashMap,
    net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
};

use tracing::{debug, error, info, warn};

use crate::{
    broadcaster::Broadcaster,
    config::ServerConfig,
    connection::Connection,
    connection_handler::{ConnectionHandler, HandlerId},
    error::{ChatError, Result},
    registry::Registry,
};

/// Accepts chat connections and runs one thread per peer.
///
/// Every `Listener` owns its own `Registry`, so several can run side by side
/// in one process.
#[derive(Debug)]
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    broadcaster: Arc<Broadcaster>,
    pending: Arc<Pending>,
    stopping: Arc<AtomicBool>,
}

/// Streams accepted but not yet registered, i.e. still waiting for the
/// identity line.
#[derive(Debug, Default)]
struct Pending {
    streams: Mutex<HashMap<HandlerId, TcpStream>>,
}

impl Pending {
    fn insert(&self, id: HandlerId, stream: TcpStream) {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, stream);
    }

    fn remove(&self, id: HandlerId) {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn shutdown_all(&self) {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);

        for (id, stream) in streams.iter() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("Closing pending connection {}: {}", id, e);
            }
        }
    }
}

impl Listener {
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| ChatError::Bind {
            addr: addr.to_owned(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            broadcaster: Arc::new(Broadcaster::new(Arc::new(Registry::new()))),
            pending: Arc::new(Pending::default()),
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Self::bind(&config.address())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(self.broadcaster.registry())
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            addr: self.local_addr,
            stopping: Arc::clone(&self.stopping),
            registry: self.registry(),
            pending: Arc::clone(&self.pending),
        }
    }

    /// Accepts connections until `StopHandle::stop` is called. The listening
    /// socket is closed when this returns.
    pub fn serve(self) {
        info!("Listening on {}", self.local_addr);

        for (id, stream) in self.listener.incoming().enumerate() {
            if self.stopping.load(Ordering::Acquire) {
                debug!("Accept loop interrupted by shutdown");
                break;
            }

            match stream {
                Ok(stream) => self.spawn_handler(id, stream),
                Err(e) => error!("Accept failed on {}: {}", self.local_addr, e),
            }
        }

        info!("Stopped listening on {}", self.local_addr);
    }

    fn spawn_handler(&self, id: HandlerId, stream: TcpStream) {
        let pending = match stream.try_clone() {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Dropping connection {}: {}", id, e);
                return;
            }
        };
        let (connection, mut reader) = match Connection::from_tcp(stream) {
            Ok(split) => split,
            Err(e) => {
                warn!("Dropping connection {}: {}", id, e);
                return;
            }
        };

        info!(
            "Connection received on {} ({} online)",
            connection.peer(),
            self.broadcaster.registry().len(),
        );

        self.pending.insert(id, pending);
        // Accepted after `stop` swept the pending set.
        if self.stopping.load(Ordering::Acquire) {
            connection.close();
        }

        let broadcaster = Arc::clone(&self.broadcaster);
        let pending = Arc::clone(&self.pending);
        let stopping = Arc::clone(&self.stopping);

        let spawned = thread::Builder::new()
            .name(format!("handler-{id}"))
            .spawn(move || {
                let joined = ConnectionHandler::connect(id, connection, &mut reader, &broadcaster);
                pending.remove(id);

                let handler = match joined {
                    Ok(handler) => handler,
                    Err(e) => {
                        debug!("Connection {} ended before joining: {}", id, e);
                        return;
                    }
                };

                // Joined after `stop` swept the registry.
                if stopping.load(Ordering::Acquire) {
                    handler.disconnect();
                }

                handler.run(reader, &broadcaster);
            });

        if let Err(e) = spawned {
            self.pending.remove(id);
            error!("Couldn't spawn handler thread for connection {}: {}", id, e);
        }
    }
}

/// Stops a running `Listener` from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle {
    addr: SocketAddr,
    stopping: Arc<AtomicBool>,
    registry: Arc<Registry>,
    pending: Arc<Pending>,
}

impl StopHandle {
    /// Makes `serve` return and closes every open connection; each handler
    /// then leaves through its usual teardown.
    pub fn stop(&self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }

        // `accept` only returns on a new connection, so make one.
        if let Err(e) = TcpStream::connect(wake_address(self.addr)) {
            debug!("Couldn't wake accept loop on {}: {}", self.addr, e);
        }

        self.pending.shutdown_all();
        for handler in self.registry.snapshot() {
            handler.disconnect();
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

fn wake_address(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(v4) if v4.ip().is_unspecified() => {
            SocketAddr::from((Ipv4Addr::LOCALHOST, v4.port()))
        }
        SocketAddr::V6(v6) if v6.ip().is_unspecified() => {
            SocketAddr::from((Ipv6Addr::LOCALHOST, v6.port()))
        }
        addr => addr,
    }
}
