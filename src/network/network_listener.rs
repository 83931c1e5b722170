//! # Network Listener Module
//!
//! One TCP listener per capability. Every accepted connection is served by its own tokio
//! task running [`Capability::handle_session`]; a session that fails or panics only ends
//! its own task.
//!
//! ```text
//! ┌─────────────┐    ┌──────────────────┐    ┌────────────────────┐
//! │ Incoming    │───▶│ NetworkListener  │───▶│ Capability session │ (one task each)
//! │ Connections │    │ (accept loop per │    └────────────────────┘
//! └─────────────┘    │  capability)     │
//!                    └──────────────────┘
//! ```

use crate::capabilities::Capability;
use crate::error_handling::types::NetworkError;
use log::{debug, error, info, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

const LISTEN_BACKLOG: u32 = 1024;

/// Pause after a failed `accept`, e.g. when the process ran out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct NetworkListener {
    bind_address: IpAddr,
    /// Flipped to `true` to stop every accept loop
    shutdown_tx: watch::Sender<bool>,
    accept_loops: Vec<JoinHandle<()>>,
    local_addrs: Vec<SocketAddr>,
}

impl NetworkListener {
    pub fn new(bind_address: IpAddr) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            bind_address,
            shutdown_tx,
            accept_loops: Vec::new(),
            local_addrs: Vec::new(),
        }
    }

    /// Binds `bind_address:port` for the capability and starts accepting connections.
    ///
    /// Returns the bound address, which differs from the configured one when port 0 is used.
    ///
    /// # Errors
    ///
    /// - `NetworkError::SockError` if the socket cannot be created or put in listening mode
    /// - `NetworkError::BindError` if the address is taken or not permitted (ports < 1024)
    pub fn bind(&mut self, capability: Arc<dyn Capability>) -> Result<SocketAddr, NetworkError> {
        let addr = SocketAddr::new(self.bind_address, capability.port());

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|err| {
            error!("[!] Socket error: {:?}", err);
            NetworkError::SockError(err)
        })?;
        socket.set_reuseaddr(true).map_err(NetworkError::SockError)?;
        socket.bind(addr).map_err(|err| {
            error!("[!] Unable to bind {}: {:?}", addr, err);
            NetworkError::BindError(err)
        })?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(NetworkError::SockError)?;
        let local_addr = listener.local_addr().map_err(NetworkError::SockError)?;

        info!(
            "Listening for {} connections on {}",
            capability.protocol(),
            local_addr
        );
        let shutdown = self.shutdown_tx.subscribe();
        self.accept_loops
            .push(tokio::spawn(accept_loop(listener, capability, shutdown)));
        self.local_addrs.push(local_addr);

        Ok(local_addr)
    }

    /// Binds every capability, stopping at the first failure.
    pub fn bind_capabilities(
        &mut self,
        capabilities: &[Arc<dyn Capability>],
    ) -> Result<Vec<SocketAddr>, NetworkError> {
        capabilities
            .iter()
            .map(|capability| self.bind(capability.clone()))
            .collect()
    }

    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Stops accepting connections and aborts the sessions still running.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.accept_loops.drain(..) {
            if let Err(e) = handle.await {
                warn!("Accept loop ended abnormally: {}", e);
            }
        }
        self.local_addrs.clear();
    }
}

async fn accept_loop(
    listener: TcpListener,
    capability: Arc<dyn Capability>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Accepted {} connection from {}", capability.protocol(), peer);
                    let capability = capability.clone();
                    sessions.spawn(async move {
                        capability.handle_session(Box::new(stream), peer).await
                    });
                }
                Err(e) => {
                    warn!("Failed to accept a {} connection: {}", capability.protocol(), e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = joined {
                    error!("A {} session task failed: {}", capability.protocol(), e);
                }
            }
        }
    }

    debug!(
        "Stopping {} listener, aborting {} live session(s)",
        capability.protocol(),
        sessions.len()
    );
    sessions.shutdown().await;
}
