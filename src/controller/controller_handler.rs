use crate::capabilities::build_capabilities;
use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::network::network_listener::NetworkListener;
use crate::reporting::relay::ReportingRelay;
use crate::reporting::sinks::{FileSink, LogSink};
use log::{error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Owns the reporting relay and the listeners for the lifetime of the process.
pub struct Controller {
    pub config: Config,
    relay: ReportingRelay,
    listener: NetworkListener,
}

impl Controller {
    /// Builds the relay and attaches the sinks requested by the configuration. Nothing is
    /// bound or spawned yet.
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        let relay = ReportingRelay::new(config.reporting.queue_capacity);

        if config.reporting.log_events {
            relay.register_sink(Arc::new(LogSink));
        }
        if let Some(path) = &config.reporting.json_log_file {
            relay.register_sink(Arc::new(FileSink::new(path)?));
        }
        info!("Reporting relay ready with {} sink(s)", relay.sink_count());

        let listener = NetworkListener::new(config.bind_address);
        Ok(Self {
            config,
            relay,
            listener,
        })
    }

    pub fn relay(&self) -> &ReportingRelay {
        &self.relay
    }

    /// Starts the relay, then binds every enabled capability.
    ///
    /// On failure everything already started is torn down again.
    pub async fn start(&mut self) -> Result<Vec<SocketAddr>, ControllerError> {
        self.relay.start()?;

        let capabilities = build_capabilities(&self.config.capabilities, &self.relay.handle());
        if capabilities.is_empty() {
            self.shutdown().await;
            return Err(ControllerError::InitializationFailed(
                "no capability enabled".to_string(),
            ));
        }

        match self.listener.bind_capabilities(&capabilities) {
            Ok(addrs) => Ok(addrs),
            Err(e) => {
                error!("[!] Unable to bind capabilities: {}", e);
                self.shutdown().await;
                Err(e.into())
            }
        }
    }

    /// Runs until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Runs until `shutdown_signal` completes, then shuts down.
    pub async fn run_until<F: Future>(&mut self, shutdown_signal: F) -> Result<(), ControllerError> {
        let addrs = self.start().await?;
        info!("Honeypot running on {:?}", addrs);

        shutdown_signal.await;
        info!("Shutdown requested");
        self.shutdown().await;
        Ok(())
    }

    /// Stops the listeners, then drains and stops the relay.
    pub async fn shutdown(&mut self) {
        self.listener.shutdown().await;
        if self.relay.is_running() {
            if let Err(e) = self.relay.stop().await {
                warn!("Reporting relay did not stop cleanly: {}", e);
            }
        }
        let dropped = self.relay.dropped_events();
        if dropped > 0 {
            warn!("{} event(s) were dropped because the relay queue was full", dropped);
        }
        info!("Controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::types::{
        CapabilitiesConfig, CapabilityConfig, ImapOptions, ReportingConfig,
    };
    use crate::reporting::event::EventKind;
    use crate::reporting::sinks::MemorySink;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::tempdir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn config(imap_enabled: bool, reporting: ReportingConfig) -> Config {
        Config {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            reporting,
            capabilities: CapabilitiesConfig {
                imap: Some(CapabilityConfig {
                    enabled: imap_enabled,
                    port: 0,
                    timeout: 30,
                    protocol_specific_data: ImapOptions::default(),
                }),
            },
        }
    }

    #[tokio::test]
    async fn serves_imap_and_reports_to_sinks() {
        let dir = tempdir().unwrap();
        let json_log = dir.path().join("events.jsonl");
        let reporting = ReportingConfig {
            log_events: false,
            json_log_file: Some(json_log.clone()),
            ..Default::default()
        };

        let mut controller = Controller::new(config(true, reporting)).unwrap();
        assert_eq!(controller.relay().sink_count(), 1);
        let memory = Arc::new(MemorySink::new());
        controller.relay().register_sink(memory.clone());

        let addrs = controller.start().await.unwrap();
        assert_eq!(addrs.len(), 1);

        let stream = TcpStream::connect(addrs[0]).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("* OK IMAP4rev1 Server Ready")
        );
        write_half
            .write_all(b"a1 LOGIN admin hunter2\r\na2 LOGOUT\r\n")
            .await
            .unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("a1 NO Authentication failed")
        );
        lines.next_line().await.unwrap();
        lines.next_line().await.unwrap();
        assert_eq!(lines.next_line().await.unwrap(), None);

        controller.shutdown().await;
        assert!(!controller.relay().is_running());

        let events = memory.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1].kind, EventKind::LoginAttempt(_)));

        let written = std::fs::read_to_string(&json_log).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert!(written.contains("\"hunter2\""));
    }

    #[tokio::test]
    async fn refuses_to_start_without_capabilities() {
        let mut controller = Controller::new(config(false, ReportingConfig::default())).unwrap();
        assert!(matches!(
            controller.start().await,
            Err(ControllerError::InitializationFailed(_))
        ));
        assert!(!controller.relay().is_running());
    }

    #[tokio::test]
    async fn run_until_returns_after_signal() {
        let mut controller = Controller::new(config(true, ReportingConfig::default())).unwrap();
        controller.run_until(async {}).await.unwrap();
        assert!(!controller.relay().is_running());
    }

    #[test]
    fn unwritable_event_log_is_an_error() {
        let reporting = ReportingConfig {
            json_log_file: Some("/nonexistent/dir/events.jsonl".into()),
            ..Default::default()
        };
        assert!(matches!(
            Controller::new(config(true, reporting)),
            Err(ControllerError::SinkError(_))
        ));
    }
}
