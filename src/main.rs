use std::{process::exit, sync::Arc, time::Duration};

use home_inventory::{
    config::get_config,
    server::{Server, ServerHandle},
    users::MemoryUserStore,
};
use log::*;
use tokio::{select, signal, time};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    colog::init();
    log_panics::init();

    let config = get_config().unwrap_or_default();
    let store = match MemoryUserStore::load(&config.users) {
        Ok(store) => store,
        Err(e) => {
            error!("{e}, every sign-in will be revoked");
            MemoryUserStore::default()
        }
    };

    let bind = config.bind.clone();
    let handle = ServerHandle::new(config, Arc::new(store));
    let (server, handle) = match Server::bind(bind.as_str(), handle).await {
        Ok(bound) => bound,
        Err(e) => {
            error!("Couldn't bind {bind}: {e}");
            exit(1);
        }
    };
    match server.local_addr() {
        Ok(addr) => info!("TCP listener is bound to {addr}"),
        Err(e) => warn!("Bound, but can't read local address: {e}"),
    }

    select! {
        _ = server.serve() => {}
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Can't listen for ctrl-c: {e}");
            }
            handle.shutdown().await;
            let drained = time::timeout(SHUTDOWN_GRACE, async {
                while handle.connected().await > 0 {
                    time::sleep(Duration::from_millis(50)).await;
                }
            })
            .await;
            if drained.is_err() {
                warn!("{} clients still connected at exit", handle.connected().await);
            }
        }
    }
}
