//! Event model carried from session handlers to sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use uuid::Uuid;

/// How a credential was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMechanism {
    /// IMAP `LOGIN` command
    Login,
    /// SASL `PLAIN`
    Plain,
    /// SASL `LOGIN` (username and password in two continuation steps)
    SaslLogin,
}

impl AuthMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMechanism::Login => "LOGIN",
            AuthMechanism::Plain => "PLAIN",
            AuthMechanism::SaslLogin => "SASL_LOGIN",
        }
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One credential submission, decoded but never verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialAttempt {
    pub mechanism: AuthMechanism,
    pub identity: String,
    pub authzid: Option<String>,
    pub secret: String,
}

impl CredentialAttempt {
    pub fn new(
        mechanism: AuthMechanism,
        identity: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            mechanism,
            identity: identity.into(),
            authzid: None,
            secret: secret.into(),
        }
    }
}

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    ClientLogout,
    ClientDisconnect,
    Timeout,
    AttemptsExhausted,
    ProtocolViolation,
    TransportError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SessionOpened,
    LoginAttempt(CredentialAttempt),
    ProtocolError {
        command: Option<String>,
        reason: String,
    },
    SessionClosed {
        reason: CloseReason,
        attempts: u32,
    },
}

/// Immutable record of something observed on a session.
///
/// Once published, ownership moves into the reporting relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub session_id: Uuid,
    pub protocol: String,
    pub peer: SocketAddr,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(session_id: Uuid, protocol: &str, peer: SocketAddr, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            protocol: protocol.to_string(),
            peer,
            timestamp: Utc::now(),
            kind,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {} ", self.session_id, self.protocol, self.peer)?;
        match &self.kind {
            EventKind::SessionOpened => write!(f, "session opened"),
            EventKind::LoginAttempt(attempt) => write!(
                f,
                "login attempt mechanism={} identity={:?} secret={:?}",
                attempt.mechanism, attempt.identity, attempt.secret
            ),
            EventKind::ProtocolError { command, reason } => write!(
                f,
                "protocol error command={} reason={}",
                command.as_deref().unwrap_or("-"),
                reason
            ),
            EventKind::SessionClosed { reason, attempts } => {
                write!(f, "session closed reason={:?} attempts={}", reason, attempts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn peer() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 45)), 12345)
    }

    #[test]
    fn login_attempt_serializes_with_type_tag() {
        let event = Event::new(
            Uuid::new_v4(),
            "imap",
            peer(),
            EventKind::LoginAttempt(CredentialAttempt::new(
                AuthMechanism::Plain,
                "пайтон",
                "наилучшийпароль",
            )),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["protocol"], "imap");
        assert_eq!(json["peer"], "203.0.113.45:12345");
        assert_eq!(json["kind"]["type"], "login_attempt");
        assert_eq!(json["kind"]["mechanism"], "PLAIN");
        assert_eq!(json["kind"]["identity"], "пайтон");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn display_includes_credentials() {
        let event = Event::new(
            Uuid::nil(),
            "imap",
            peer(),
            EventKind::LoginAttempt(CredentialAttempt::new(
                AuthMechanism::Login,
                "kajoj_admin",
                "the best password",
            )),
        );
        let line = event.to_string();
        assert!(line.contains("mechanism=LOGIN"));
        assert!(line.contains("\"the best password\""));
    }
}
