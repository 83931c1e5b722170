//! # Reporting Relay
//!
//! In-process event bus between capability sessions (many producers) and sinks.
//!
//! ```text
//! ┌──────────────┐
//! │ session A    │──┐
//! └──────────────┘  │  publish()   ┌───────────────┐   handle()   ┌─────────┐
//! ┌──────────────┐  ├────────────▶│ bounded mpsc  │─────────────▶│ sink 1  │
//! │ session B    │──┘  try_send    │ dispatch task │─────────────▶│ sink 2  │
//! └──────────────┘                 └───────────────┘              └─────────┘
//! ```
//!
//! ## Lifecycle
//!
//! - [`ReportingRelay::start`] allocates the queue and spawns the dispatch task.
//! - [`ReportingRelay::stop`] closes the queue, lets the dispatch task drain what is
//!   already queued and waits for it. No sink is called once `stop` has returned.
//! - Dropping a running relay closes the queue too; the dispatch task drains it in the
//!   background.
//!
//! ## Overflow policy
//!
//! Publishing never blocks a session. When the queue is full the newest event is
//! dropped, counted in [`ReportingRelay::dropped_events`] and `RelayError::QueueFull`
//! is returned. Publishing while the relay is not running returns
//! `RelayError::NotRunning` and the event is discarded.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rucher::reporting::ReportingRelay;
//! use rucher::reporting::sinks::LogSink;
//!
//! #[tokio::main]
//! async fn main() {
//!     let relay = ReportingRelay::new(1024);
//!     relay.register_sink(Arc::new(LogSink));
//!     relay.start().unwrap();
//!
//!     let handle = relay.handle(); // cloned into every capability
//!     # drop(handle);
//!
//!     relay.stop().await.unwrap();
//! }
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error_handling::types::RelayError;
use crate::reporting::event::Event;
use crate::reporting::sink::Sink;

/// Identifier returned by [`ReportingRelay::register_sink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

struct RegisteredSink {
    id: SinkId,
    sink: Arc<dyn Sink>,
}

/// State shared by the relay, its handles and the dispatch task.
struct Shared {
    /// `Some` while running. Handles never clone the sender, so dropping it here is enough
    /// to close the queue.
    sender: RwLock<Option<mpsc::Sender<Event>>>,
    sinks: RwLock<Vec<RegisteredSink>>,
    dropped: AtomicU64,
    next_sink_id: AtomicU64,
}

impl Shared {
    fn publish(&self, event: Event) -> Result<(), RelayError> {
        let sender = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            trace!("[{}] relay not running, event discarded", event.session_id);
            return Err(RelayError::NotRunning);
        };

        match sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "[{}] reporting queue full, event dropped (total dropped: {})",
                    event.session_id, dropped
                );
                Err(RelayError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(RelayError::NotRunning),
        }
    }

    fn snapshot_sinks(&self) -> Vec<(SinkId, Arc<dyn Sink>)> {
        self.sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|registered| (registered.id, Arc::clone(&registered.sink)))
            .collect()
    }
}

/// Cheap, cloneable publisher side of the relay, handed to every capability.
#[derive(Clone)]
pub struct RelayHandle {
    shared: Arc<Shared>,
}

impl RelayHandle {
    /// Queues `event` for delivery without waiting.
    pub fn publish(&self, event: Event) -> Result<(), RelayError> {
        self.shared.publish(event)
    }
}

/// The reporting relay service.
///
/// Constructed once by the controller and shared by reference; sessions only ever see
/// a [`RelayHandle`].
pub struct ReportingRelay {
    shared: Arc<Shared>,
    queue_capacity: usize,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ReportingRelay {
    /// Creates a stopped relay whose queue holds at most `queue_capacity` events.
    ///
    /// A capacity of 0 is raised to 1.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                sender: RwLock::new(None),
                sinks: RwLock::new(Vec::new()),
                dropped: AtomicU64::new(0),
                next_sink_id: AtomicU64::new(0),
            }),
            queue_capacity: queue_capacity.max(1),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Adds a sink; it receives every event dispatched from now on.
    pub fn register_sink(&self, sink: Arc<dyn Sink>) -> SinkId {
        let id = SinkId(self.shared.next_sink_id.fetch_add(1, Ordering::Relaxed));
        debug!("Registering sink '{}' as {:?}", sink.name(), id);
        self.shared
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RegisteredSink { id, sink });
        id
    }

    /// Removes a sink. Returns `false` if `id` was not registered.
    pub fn deregister_sink(&self, id: SinkId) -> bool {
        let mut sinks = self
            .shared
            .sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = sinks.len();
        sinks.retain(|registered| registered.id != id);
        before != sinks.len()
    }

    pub fn sink_count(&self) -> usize {
        self.shared
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of events dropped because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Allocates the queue and spawns the dispatch task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), RelayError> {
        let mut dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if dispatcher.is_some() {
            return Err(RelayError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        *self
            .shared
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        *dispatcher = Some(tokio::spawn(dispatch(rx, Arc::clone(&self.shared))));

        info!(
            "Reporting relay started (queue capacity: {})",
            self.queue_capacity
        );
        Ok(())
    }

    /// Closes the queue, drains already queued events and waits for the dispatch task.
    pub async fn stop(&self) -> Result<(), RelayError> {
        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RelayError::NotRunning)?;

        // Dropping the only sender lets the dispatch loop finish once the queue is empty.
        self.shared
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        handle
            .await
            .map_err(|e| RelayError::DispatcherFailed(e.to_string()))?;

        info!(
            "Reporting relay stopped ({} event(s) dropped)",
            self.dropped_events()
        );
        Ok(())
    }

    /// Same as publishing through a [`RelayHandle`].
    pub fn publish(&self, event: Event) -> Result<(), RelayError> {
        self.shared.publish(event)
    }
}

impl Drop for ReportingRelay {
    /// Closes the queue. The detached dispatch task drains it and exits.
    fn drop(&mut self) {
        if self
            .shared
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("Reporting relay dropped while running");
        }
    }
}

async fn dispatch(mut rx: mpsc::Receiver<Event>, shared: Arc<Shared>) {
    debug!("Reporting dispatch loop started");
    let mut delivered: u64 = 0;

    while let Some(event) = rx.recv().await {
        for (id, sink) in shared.snapshot_sinks() {
            deliver(id, sink.as_ref(), &event);
        }
        delivered += 1;
    }

    debug!(
        "Reporting dispatch loop finished after {} event(s)",
        delivered
    );
}

fn deliver(id: SinkId, sink: &dyn Sink, event: &Event) {
    match catch_unwind(AssertUnwindSafe(|| sink.handle(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(
            "[{}] sink '{}' ({:?}) failed: {}",
            event.session_id,
            sink.name(),
            id,
            e
        ),
        Err(_) => error!(
            "[{}] sink '{}' ({:?}) panicked",
            event.session_id,
            sink.name(),
            id
        ),
    }
}
