//! SASL `LOGIN`: the server prompts for the username, then for the password, each answer
//! arriving as its own base64 line.

use crate::error_handling::types::SaslError;
use crate::reporting::event::{AuthMechanism, CredentialAttempt};

use super::{utf8_field, SaslMechanism, SaslStep};

const USERNAME_CHALLENGE: &[u8] = b"Username:";
const PASSWORD_CHALLENGE: &[u8] = b"Password:";

#[derive(Debug, Clone, PartialEq, Eq)]
enum LoginState {
    AwaitingUsername,
    AwaitingPassword { username: String },
    Complete,
}

#[derive(Debug)]
pub struct LoginMechanism {
    state: LoginState,
}

impl LoginMechanism {
    pub fn new() -> Self {
        Self {
            state: LoginState::AwaitingUsername,
        }
    }
}

impl Default for LoginMechanism {
    fn default() -> Self {
        Self::new()
    }
}

impl SaslMechanism for LoginMechanism {
    fn mechanism(&self) -> AuthMechanism {
        AuthMechanism::SaslLogin
    }

    fn initial_challenge(&self) -> Vec<u8> {
        USERNAME_CHALLENGE.to_vec()
    }

    fn step(&mut self, response: &[u8]) -> Result<SaslStep, SaslError> {
        match std::mem::replace(&mut self.state, LoginState::Complete) {
            LoginState::AwaitingUsername => {
                let username = utf8_field(response)?;
                self.state = LoginState::AwaitingPassword { username };
                Ok(SaslStep::Challenge(PASSWORD_CHALLENGE.to_vec()))
            }
            LoginState::AwaitingPassword { username } => {
                let password = utf8_field(response)?;
                Ok(SaslStep::Done(CredentialAttempt::new(
                    AuthMechanism::SaslLogin,
                    username,
                    password,
                )))
            }
            LoginState::Complete => Err(SaslError::ExchangeComplete),
        }
    }
}
