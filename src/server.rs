use std::{collections::HashMap, io, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::FutureExt;
use log::*;
use tokio::{
    net::{TcpListener, ToSocketAddrs},
    sync::{Mutex, mpsc::Sender},
    time,
};

use crate::{
    client::*,
    config::Config,
    status::{CloseCode, ErrorKind},
    users::UserStore,
    utils::new_id,
};

/// Pause after a failed `accept`, so running out of descriptors doesn't spin.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub type RegistryMap = HashMap<u64, (Sender<ClientSignal>, Auth)>;
pub type Registry = Arc<Mutex<RegistryMap>>;

/// What every connection shares. Room state itself is never shared: each
/// client task owns its own `Home`.
#[derive(Clone)]
pub struct ServerHandle {
    pub config: Arc<Config>,
    pub store: Arc<dyn UserStore>,
    pub registry: Registry,
}

impl ServerHandle {
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns `None` when the server is full.
    pub async fn register(&mut self, tx: Sender<ClientSignal>, auth: Auth) -> Option<u64> {
        let mut registry = self.registry.lock().await;
        if registry.len() >= self.config.max_clients {
            warn!("Refusing {auth:?}, {} clients connected", registry.len());
            return None;
        }
        let id = new_id();
        registry.insert(id, (tx, auth));
        Some(id)
    }

    pub async fn unregister(&mut self, id: u64) {
        self.registry.lock().await.remove(&id);
    }

    pub async fn connected(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Asks every connected client to close.
    pub async fn shutdown(&self) {
        let clients: Vec<(u64, Sender<ClientSignal>)> = {
            let registry = self.registry.lock().await;
            registry
                .iter()
                .map(|(&id, (tx, _))| (id, tx.clone()))
                .collect()
        };
        info!("Closing {} clients", clients.len());
        for (id, tx) in clients {
            let signal = ClientSignal::Close {
                kind: ErrorKind::Normal(CloseCode::Away),
            };
            if let Err(e) = tx.send(signal).await {
                error!("Client {id} channel lost: {e}");
                self.registry.lock().await.remove(&id);
            }
        }
    }
}

pub struct Server {
    listener: TcpListener,
    handle: ServerHandle,
}

impl Server {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        handle: ServerHandle,
    ) -> io::Result<(Server, ServerHandle)> {
        let listener = TcpListener::bind(addr).await?;
        let server = Server {
            listener,
            handle: handle.clone(),
        };
        Ok((server, handle))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn serve(self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {e}, retrying in {ACCEPT_RETRY_DELAY:?}");
                    time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            info!("Inbound connection: {peer}");
            tokio::spawn(Client::try_handshake(self.handle.clone(), stream).then(
                |client_res| async move {
                    match client_res {
                        Ok(client) => {
                            let id = client.id;
                            match client.run().await {
                                Ok(()) | Err(ClientError::Closed(_)) => info!("Client {id} left"),
                                Err(e) => error!("Client {id}: {e}"),
                            }
                        }
                        Err(e) => warn!("Handshake error: {e}"),
                    }
                },
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::MemoryUserStore;

    #[test]
    fn accept_retry_waits() {
        assert!(ACCEPT_RETRY_DELAY >= Duration::from_millis(10));
        assert!(ACCEPT_RETRY_DELAY <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn register_respects_capacity() {
        let config = Config {
            max_clients: 1,
            ..Config::default()
        };
        let mut handle = ServerHandle::new(config, Arc::new(MemoryUserStore::default()));
        let (tx, _rx) = tokio::sync::mpsc::channel(1);

        let id = handle.register(tx.clone(), Auth::new(None)).await.unwrap();
        assert!(handle.register(tx, Auth::new(None)).await.is_none());
        handle.unregister(id).await;
        assert_eq!(handle.connected().await, 0);
    }
}
