//! SASL decoding for capabilities that accept `AUTHENTICATE`-style exchanges.
//!
//! Every client response travels as one base64 line. [`decode_base64`] turns it back into
//! raw bytes and a [`SaslMechanism`] consumes those bytes step by step until it has a
//! complete [`CredentialAttempt`]. Single-step mechanisms (`PLAIN`) finish on the first
//! response; challenge/response mechanisms (`LOGIN`) keep their progress in their own
//! state.

pub mod login;
pub mod plain;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error_handling::types::SaslError;
use crate::reporting::event::{AuthMechanism, CredentialAttempt};

pub use login::LoginMechanism;
pub use plain::{decode_plain, PlainMechanism};

/// Outcome of feeding one client response to a mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslStep {
    /// Send this challenge (before base64 framing) and wait for another response.
    Challenge(Vec<u8>),
    /// The exchange produced a credential.
    Done(CredentialAttempt),
}

/// A server-side SASL mechanism exchange. One instance serves one exchange.
pub trait SaslMechanism: Send {
    fn mechanism(&self) -> AuthMechanism;

    /// Challenge sent with the first continuation prompt, empty for most mechanisms.
    fn initial_challenge(&self) -> Vec<u8>;

    /// Consumes one decoded client response.
    fn step(&mut self, response: &[u8]) -> Result<SaslStep, SaslError>;
}

/// Mechanism names advertised in `AUTH=` capabilities.
pub const SUPPORTED_MECHANISMS: &[&str] = &["PLAIN", "LOGIN"];

/// Creates a fresh exchange for `name`, matched case-insensitively.
pub fn mechanism_for(name: &str) -> Option<Box<dyn SaslMechanism>> {
    match name.to_ascii_uppercase().as_str() {
        "PLAIN" => Some(Box::new(PlainMechanism::new())),
        "LOGIN" => Some(Box::new(LoginMechanism::new())),
        _ => None,
    }
}

/// Decodes one base64 continuation line. Surrounding whitespace is ignored.
pub fn decode_base64(line: &str) -> Result<Vec<u8>, SaslError> {
    STANDARD
        .decode(line.trim())
        .map_err(|e| SaslError::InvalidBase64(e.to_string()))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn utf8_field(bytes: &[u8]) -> Result<String, SaslError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| SaslError::InvalidUtf8)
}
