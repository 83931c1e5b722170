use log::info;

use crate::error_handling::types::SinkError;
use crate::reporting::event::Event;
use crate::reporting::sink::Sink;

/// Writes one `info!` line per event through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn handle(&self, event: &Event) -> Result<(), SinkError> {
        info!("{}", event);
        Ok(())
    }
}
