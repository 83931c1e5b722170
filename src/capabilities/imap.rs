//! IMAP4rev1 capability: greets, collects `LOGIN` and `AUTHENTICATE` credentials, refuses
//! them all.

pub mod command;
pub mod response;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Capability, SessionStream};
use crate::configuration::types::{CapabilityConfig, ImapOptions};
use crate::reporting::event::CloseReason;
use crate::reporting::relay::RelayHandle;
use session::ImapSession;

pub const PROTOCOL: &str = "imap";

pub struct Imap {
    options: Arc<CapabilityConfig<ImapOptions>>,
    relay: RelayHandle,
}

impl Imap {
    pub fn new(options: CapabilityConfig<ImapOptions>, relay: RelayHandle) -> Self {
        Self {
            options: Arc::new(options),
            relay,
        }
    }

    /// Serves one connection until the session closes.
    pub async fn serve<S>(&self, stream: S, peer: SocketAddr) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Send,
    {
        ImapSession::new(stream, peer, self.options.clone(), self.relay.clone())
            .run()
            .await
    }
}

#[async_trait]
impl Capability for Imap {
    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    fn port(&self) -> u16 {
        self.options.port
    }

    async fn handle_session(&self, stream: Box<dyn SessionStream>, peer: SocketAddr) -> CloseReason {
        self.serve(stream, peer).await
    }
}
