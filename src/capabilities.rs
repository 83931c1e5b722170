//! Emulated network services.
//!
//! A [`Capability`] owns the protocol side of a connection: the listener accepts the
//! socket and hands it over, the capability talks to the client until the session is
//! closed and reports what it saw through the reporting relay.

pub mod imap;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::configuration::types::CapabilitiesConfig;
use crate::reporting::event::CloseReason;
use crate::reporting::relay::RelayHandle;

pub use imap::Imap;

/// Any bidirectional byte stream a session can run over (TCP socket, in-memory pipe...).
pub trait SessionStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SessionStream for T {}

#[async_trait]
pub trait Capability: Send + Sync {
    /// Protocol name stamped on every event, e.g. `imap`
    fn protocol(&self) -> &'static str;

    fn port(&self) -> u16;

    /// Runs one session to completion and returns why it closed.
    async fn handle_session(&self, stream: Box<dyn SessionStream>, peer: SocketAddr) -> CloseReason;
}

/// Instantiates every enabled capability.
pub fn build_capabilities(
    config: &CapabilitiesConfig,
    relay: &RelayHandle,
) -> Vec<Arc<dyn Capability>> {
    let mut capabilities: Vec<Arc<dyn Capability>> = Vec::new();

    if let Some(imap) = config.imap.as_ref().filter(|imap| imap.enabled) {
        info!("IMAP capability enabled on port {}", imap.port);
        capabilities.push(Arc::new(Imap::new(imap.clone(), relay.clone())));
    }

    capabilities
}
