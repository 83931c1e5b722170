//! Session management core module.
//!
//! This module provides the per-connection plumbing shared by every capability: the
//! session record with its attempt counter and the buffered line reader enforcing the
//! idle timeout.

use serde::{Deserialize, Serialize};

use crate::reporting::event::CloseReason;

/// Submodule for the idle-timeout aware line reader.
pub mod line_reader;
/// Submodule for session data structures and utilities.
pub mod session;

/// Represents the current status of a session.
///
/// Variants:
/// - `Active`: The connection is open and the capability is talking to the client.
/// - `Closed`: The session reached its terminal state for the given reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Closed(CloseReason),
}
