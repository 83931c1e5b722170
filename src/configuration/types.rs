use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Options shared by every capability plus a protocol specific block.
///
/// Resolved before any session starts and shared read-only by all sessions of the
/// capability.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig<P> {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub port: u16,
    /// Idle timeout in seconds
    pub timeout: u64,
    pub protocol_specific_data: P,
}

impl<P> CapabilityConfig<P> {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ImapOptions {
    pub max_attempts: u32,
    /// Greeting line sent verbatim on connect, e.g. `* OK IMAP4rev1 Server Ready`
    pub banner: String,
}

impl Default for ImapOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            banner: String::from("* OK IMAP4rev1 Server Ready"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitiesConfig {
    pub imap: Option<CapabilityConfig<ImapOptions>>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Bound of the relay queue; events published while it is full are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_log_events")]
    pub log_events: bool,
    #[serde(default)]
    pub json_log_file: Option<PathBuf>,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            log_events: default_log_events(),
            json_log_file: None,
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_log_events() -> bool {
    true
}
