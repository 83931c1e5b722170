//! Sink Trait
//!
//! This module defines the `Sink` trait, the interface every reporting backend implements
//! to receive events from the [`ReportingRelay`](super::relay::ReportingRelay).
//!
//! Sinks are called from the relay's single dispatch task, one event at a time and in
//! arrival order. A failing sink only loses its own copy of the event: the relay logs the
//! error and carries on with the remaining sinks.

use crate::error_handling::types::SinkError;
use crate::reporting::event::Event;

pub trait Sink: Send + Sync {
    /// Short name used in relay logs.
    fn name(&self) -> &str;

    /// Consumes one event.
    fn handle(&self, event: &Event) -> Result<(), SinkError>;
}
