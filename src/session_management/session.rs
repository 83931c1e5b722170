use chrono::{DateTime, Utc};
use log::trace;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::reporting::event::{CloseReason, Event, EventKind};
use crate::reporting::relay::RelayHandle;
use crate::session_management::SessionStatus;

/// Lifetime record of one accepted connection.
///
/// Owned by the task serving the connection, so the attempt counter needs no
/// synchronisation.
#[derive(Clone)]
pub struct Session {
    pub id: Uuid,
    pub protocol: &'static str,
    pub client_addr: SocketAddr,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub status: SessionStatus,
    relay: RelayHandle,
}

impl Session {
    pub fn new(protocol: &'static str, client_addr: SocketAddr, relay: RelayHandle) -> Self {
        Self {
            id: Uuid::new_v4(),
            protocol,
            client_addr,
            start_time: Utc::now(),
            end_time: None,
            attempts: 0,
            status: SessionStatus::Active,
            relay,
        }
    }

    /// Counts one more credential attempt and returns the new total.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, SessionStatus::Closed(_))
    }

    /// Builds an event stamped with this session's identity.
    pub fn event(&self, kind: EventKind) -> Event {
        Event::new(self.id, self.protocol, self.client_addr, kind)
    }

    /// Hands an event to the reporting relay. Reporting problems never affect the
    /// protocol exchange, they are only traced.
    pub fn publish(&self, kind: EventKind) {
        if let Err(e) = self.relay.publish(self.event(kind)) {
            trace!("[{}] event not published: {}", self.id, e);
        }
    }

    /// Marks the session closed and publishes the matching `SessionClosed` event.
    ///
    /// Only the first call has an effect.
    pub fn close(&mut self, reason: CloseReason) {
        if self.is_closed() {
            return;
        }
        self.status = SessionStatus::Closed(reason);
        self.end_time = Some(Utc::now());
        self.publish(EventKind::SessionClosed {
            reason,
            attempts: self.attempts,
        });
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_time.unwrap_or_else(Utc::now) - self.start_time
    }
}
