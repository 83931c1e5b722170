//! Reporting subsystem
//!
//! Session handlers describe what they observe as [`Event`]s and hand them to the
//! [`ReportingRelay`], which forwards them from its own dispatch task to every registered
//! [`Sink`].
//!
//! Components:
//! - `event`: the event model published by capabilities.
//! - `relay`: the asynchronous event bus and its publisher handle.
//! - `sink`: the trait consumers implement.
//! - `sinks`: log, JSON-lines file and in-memory sinks.

pub mod event;
pub mod relay;
pub mod sink;
pub mod sinks;

pub use event::{AuthMechanism, CloseReason, CredentialAttempt, Event, EventKind};
pub use relay::{RelayHandle, ReportingRelay, SinkId};
pub use sink::Sink;
