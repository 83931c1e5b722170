//! SASL `PLAIN` (RFC 4616): `[authzid] NUL authcid NUL passwd` in a single response.

use crate::error_handling::types::SaslError;
use crate::reporting::event::{AuthMechanism, CredentialAttempt};

use super::{utf8_field, SaslMechanism, SaslStep};

/// Splits a decoded `PLAIN` payload into a credential attempt.
///
/// The payload must carry all three NUL separated fields. An empty authorization identity
/// becomes `None`. Any NUL after the second separator stays part of the password.
pub fn decode_plain(payload: &[u8]) -> Result<CredentialAttempt, SaslError> {
    let fields: Vec<&[u8]> = payload.splitn(3, |&b| b == 0).collect();
    let [authzid, authcid, password] = fields.as_slice() else {
        return Err(SaslError::MalformedPayload(format!(
            "expected authzid, authcid and password, found {} field(s)",
            fields.len()
        )));
    };

    let authzid = utf8_field(authzid)?;
    Ok(CredentialAttempt {
        mechanism: AuthMechanism::Plain,
        identity: utf8_field(authcid)?,
        authzid: (!authzid.is_empty()).then_some(authzid),
        secret: utf8_field(password)?,
    })
}

#[derive(Debug, Default)]
pub struct PlainMechanism {
    complete: bool,
}

impl PlainMechanism {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SaslMechanism for PlainMechanism {
    fn mechanism(&self) -> AuthMechanism {
        AuthMechanism::Plain
    }

    fn initial_challenge(&self) -> Vec<u8> {
        Vec::new()
    }

    fn step(&mut self, response: &[u8]) -> Result<SaslStep, SaslError> {
        if self.complete {
            return Err(SaslError::ExchangeComplete);
        }
        let attempt = decode_plain(response)?;
        self.complete = true;
        Ok(SaslStep::Done(attempt))
    }
}
