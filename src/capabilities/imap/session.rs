//! IMAP session state machine
//!
//! One [`ImapSession`] serves one connection from greeting to close. Every credential it
//! collects is refused and reported; after `max_attempts` refusals the client is
//! disconnected.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, trace};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::timeout;

use super::command::{guess_tag, tokenize, ImapCommand, MAX_LITERAL_LENGTH};
use super::response::{self, Status};
use crate::configuration::types::{CapabilityConfig, ImapOptions};
use crate::error_handling::types::{CommandError, SessionError};
use crate::reporting::event::{AuthMechanism, CloseReason, CredentialAttempt, EventKind};
use crate::reporting::relay::RelayHandle;
use crate::sasl::{self, SaslMechanism, SaslStep};
use crate::session_management::line_reader::LineReader;
use crate::session_management::session::Session;

pub enum ImapState {
    Greeting,
    AwaitingCommand,
    /// An `AUTHENTICATE` exchange waiting for the next client response
    AuthContinuation {
        tag: String,
        exchange: Box<dyn SaslMechanism>,
    },
    Closed(CloseReason),
}

impl fmt::Debug for ImapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImapState::Greeting => write!(f, "Greeting"),
            ImapState::AwaitingCommand => write!(f, "AwaitingCommand"),
            ImapState::AuthContinuation { tag, exchange } => {
                write!(f, "AuthContinuation({} {})", tag, exchange.mechanism())
            }
            ImapState::Closed(reason) => write!(f, "Closed({:?})", reason),
        }
    }
}

/// A command line that could not be accepted.
struct Rejection {
    tag: Option<String>,
    command: Option<String>,
    reason: String,
}

impl Rejection {
    fn from_line(line: &str, reason: impl fmt::Display) -> Self {
        Self {
            tag: guess_tag(line),
            command: line
                .split_whitespace()
                .nth(1)
                .map(|name| name.to_ascii_uppercase()),
            reason: reason.to_string(),
        }
    }
}

pub struct ImapSession<S> {
    reader: LineReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    options: Arc<CapabilityConfig<ImapOptions>>,
    session: Session,
}

impl<S: AsyncRead + AsyncWrite> ImapSession<S> {
    pub fn new(
        stream: S,
        peer: SocketAddr,
        options: Arc<CapabilityConfig<ImapOptions>>,
        relay: RelayHandle,
    ) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        Self {
            reader: LineReader::new(read_half, options.timeout()),
            writer,
            options,
            session: Session::new(super::PROTOCOL, peer, relay),
        }
    }

    /// Drives the session until it closes and returns why it closed.
    ///
    /// Publishes `SessionOpened` first and exactly one `SessionClosed` last.
    pub async fn run(mut self) -> CloseReason {
        info!(
            "[{}] IMAP session opened from {}",
            self.session.id, self.session.client_addr
        );
        self.session.publish(EventKind::SessionOpened);

        let mut state = ImapState::Greeting;
        let reason = loop {
            trace!("[{}] state {:?}", self.session.id, state);
            state = match state {
                ImapState::Closed(reason) => break reason,
                state => match self.advance(state).await {
                    Ok(next) => next,
                    Err(e) => self.abort(e).await,
                },
            };
        };

        self.session.close(reason);
        info!(
            "[{}] IMAP session closed: {:?} after {} attempt(s) in {}s",
            self.session.id,
            reason,
            self.session.attempts,
            self.session.duration().num_seconds()
        );
        reason
    }

    async fn advance(&mut self, state: ImapState) -> Result<ImapState, SessionError> {
        match state {
            ImapState::Greeting => {
                let greeting = response::greeting(&self.options.protocol_specific_data.banner);
                self.send(&greeting).await?;
                Ok(ImapState::AwaitingCommand)
            }
            ImapState::AwaitingCommand => match self.read_command().await? {
                None => Ok(ImapState::Closed(CloseReason::ClientDisconnect)),
                Some(Ok(command)) => self.dispatch(command).await,
                Some(Err(rejection)) => self.reject(rejection).await,
            },
            ImapState::AuthContinuation { tag, exchange } => {
                self.continue_authentication(tag, exchange).await
            }
            ImapState::Closed(reason) => Ok(ImapState::Closed(reason)),
        }
    }

    /// Maps a transport failure to its close reason, saying goodbye where it still makes
    /// sense.
    async fn abort(&mut self, error: SessionError) -> ImapState {
        debug!("[{}] {}", self.session.id, error);
        let reason = match error {
            SessionError::Timeout => {
                self.farewell(response::BYE_IDLE).await;
                CloseReason::Timeout
            }
            SessionError::LineTooLong(_) => {
                self.session.publish(EventKind::ProtocolError {
                    command: None,
                    reason: error.to_string(),
                });
                self.farewell(response::BYE_LINE_TOO_LONG).await;
                CloseReason::ProtocolViolation
            }
            SessionError::IoError(_) => CloseReason::TransportError,
        };
        ImapState::Closed(reason)
    }

    /// Reads one complete command, fetching any literals it announces.
    ///
    /// Returns `Ok(None)` once the client is gone.
    async fn read_command(
        &mut self,
    ) -> Result<Option<Result<ImapCommand, Rejection>>, SessionError> {
        let mut tokens = Vec::new();
        let mut first_line: Option<String> = None;

        loop {
            let Some(bytes) = self.reader.read_line().await? else {
                return Ok(None);
            };
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
                    let head = first_line.as_deref().unwrap_or(&lossy);
                    return Ok(Some(Err(Rejection::from_line(head, "line is not valid UTF-8"))));
                }
            };
            if first_line.is_none() && line.trim().is_empty() {
                continue;
            }
            let head = first_line.get_or_insert_with(|| line.clone()).clone();

            let parsed = match tokenize(&line) {
                Ok(parsed) => parsed,
                // Its bytes are already on the wire and cannot be told apart from commands.
                Err(CommandError::LiteralTooLarge {
                    synchronizing: false,
                    ..
                }) => return Err(SessionError::LineTooLong(MAX_LITERAL_LENGTH)),
                Err(e) => return Ok(Some(Err(Rejection::from_line(&head, e)))),
            };
            tokens.extend(parsed.tokens);

            let Some(literal) = parsed.literal else {
                break;
            };
            if literal.synchronizing {
                self.send(&response::continuation(response::LITERAL_READY))
                    .await?;
            }
            let Some(payload) = self.reader.read_exact_bytes(literal.length).await? else {
                return Ok(None);
            };
            match String::from_utf8(payload) {
                Ok(value) => tokens.push(value),
                Err(_) => {
                    return Ok(Some(Err(Rejection::from_line(
                        &head,
                        "literal is not valid UTF-8",
                    ))))
                }
            }
        }

        Ok(Some(ImapCommand::from_tokens(tokens).map_err(
            |(tag, error)| Rejection {
                tag,
                command: None,
                reason: error.to_string(),
            },
        )))
    }

    async fn dispatch(&mut self, command: ImapCommand) -> Result<ImapState, SessionError> {
        debug!(
            "[{}] {} {} ({} argument(s))",
            self.session.id,
            command.tag,
            command.name,
            command.args.len()
        );
        let tag = command.tag.as_str();

        match (command.name.as_str(), command.args.as_slice()) {
            ("CAPABILITY", []) => {
                let reply = format!(
                    "{}{}",
                    response::untagged(&format!("CAPABILITY {}", response::capability_list())),
                    response::completed(tag, "CAPABILITY")
                );
                self.send(&reply).await?;
                Ok(ImapState::AwaitingCommand)
            }
            ("NOOP", []) => {
                self.send(&response::completed(tag, "NOOP")).await?;
                Ok(ImapState::AwaitingCommand)
            }
            ("LOGOUT", []) => {
                let reply = format!(
                    "{}{}",
                    response::bye(response::BYE_LOGOUT),
                    response::completed(tag, "LOGOUT")
                );
                self.send(&reply).await?;
                Ok(ImapState::Closed(CloseReason::ClientLogout))
            }
            ("LOGIN", [identity, secret]) => {
                let attempt = CredentialAttempt::new(AuthMechanism::Login, identity, secret);
                self.refuse(tag, attempt).await
            }
            ("AUTHENTICATE", [mechanism]) => match sasl::mechanism_for(mechanism) {
                Some(exchange) => {
                    let challenge = sasl::encode_base64(&exchange.initial_challenge());
                    self.send(&response::continuation(&challenge)).await?;
                    Ok(ImapState::AuthContinuation {
                        tag: command.tag.clone(),
                        exchange,
                    })
                }
                None => {
                    self.session.publish(EventKind::ProtocolError {
                        command: Some(command.name.clone()),
                        reason: format!("unsupported mechanism {}", mechanism),
                    });
                    self.send(&response::tagged(
                        tag,
                        Status::No,
                        response::UNSUPPORTED_MECHANISM,
                    ))
                    .await?;
                    Ok(ImapState::AwaitingCommand)
                }
            },
            (name, args) => {
                let reason = match name {
                    "CAPABILITY" | "NOOP" | "LOGOUT" | "LOGIN" | "AUTHENTICATE" => {
                        format!("{} does not take {} argument(s)", name, args.len())
                    }
                    _ => format!("unknown command {}", name),
                };
                self.reject(Rejection {
                    tag: Some(command.tag.clone()),
                    command: Some(command.name.clone()),
                    reason,
                })
                .await
            }
        }
    }

    async fn continue_authentication(
        &mut self,
        tag: String,
        mut exchange: Box<dyn SaslMechanism>,
    ) -> Result<ImapState, SessionError> {
        let Some(bytes) = self.reader.read_line().await? else {
            return Ok(ImapState::Closed(CloseReason::ClientDisconnect));
        };
        let line = String::from_utf8_lossy(&bytes);

        if line.trim() == "*" {
            debug!("[{}] {} AUTHENTICATE cancelled", self.session.id, tag);
            self.send(&response::tagged(&tag, Status::Bad, response::AUTH_CANCELLED))
                .await?;
            return Ok(ImapState::AwaitingCommand);
        }

        let step = sasl::decode_base64(&line).and_then(|decoded| exchange.step(&decoded));
        match step {
            Ok(SaslStep::Challenge(challenge)) => {
                self.send(&response::continuation(&sasl::encode_base64(&challenge)))
                    .await?;
                Ok(ImapState::AuthContinuation { tag, exchange })
            }
            Ok(SaslStep::Done(attempt)) => self.refuse(&tag, attempt).await,
            Err(e) => {
                self.reject(Rejection {
                    tag: Some(tag),
                    command: Some("AUTHENTICATE".to_string()),
                    reason: format!("{} exchange failed: {}", exchange.mechanism(), e),
                })
                .await
            }
        }
    }

    /// Counts and reports a credential attempt, then turns it down.
    async fn refuse(
        &mut self,
        tag: &str,
        attempt: CredentialAttempt,
    ) -> Result<ImapState, SessionError> {
        let attempts = self.session.record_attempt();
        info!(
            "[{}] {} attempt {} from {}: {:?} / {:?}",
            self.session.id,
            attempt.mechanism,
            attempts,
            self.session.client_addr,
            attempt.identity,
            attempt.secret
        );
        self.session.publish(EventKind::LoginAttempt(attempt));
        self.send(&response::tagged(tag, Status::No, response::AUTH_FAILED))
            .await?;

        if attempts >= self.options.protocol_specific_data.max_attempts {
            self.farewell(response::BYE_TOO_MANY_FAILURES).await;
            return Ok(ImapState::Closed(CloseReason::AttemptsExhausted));
        }
        Ok(ImapState::AwaitingCommand)
    }

    async fn reject(&mut self, rejection: Rejection) -> Result<ImapState, SessionError> {
        debug!(
            "[{}] rejected {:?}: {}",
            self.session.id, rejection.command, rejection.reason
        );
        let tag = rejection.tag.as_deref().unwrap_or(response::UNTAGGED);
        let reply = response::tagged(tag, Status::Bad, response::INVALID_COMMAND);
        self.session.publish(EventKind::ProtocolError {
            command: rejection.command,
            reason: rejection.reason,
        });
        self.send(&reply).await?;
        Ok(ImapState::AwaitingCommand)
    }

    /// Writes and flushes one response. Writes are bounded by the idle timeout too.
    async fn send(&mut self, data: &str) -> Result<(), SessionError> {
        let writer = &mut self.writer;
        timeout(self.options.timeout(), async move {
            writer.write_all(data.as_bytes()).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| SessionError::Timeout)??;
        Ok(())
    }

    /// Best-effort `* BYE`; the session is closing either way.
    async fn farewell(&mut self, text: &str) {
        if let Err(e) = self.send(&response::bye(text)).await {
            trace!("[{}] BYE not delivered: {}", self.session.id, e);
        }
    }
}
