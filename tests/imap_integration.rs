use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use rucher::capabilities::{build_capabilities, Capability, Imap};
use rucher::configuration::types::{CapabilitiesConfig, CapabilityConfig, ImapOptions};
use rucher::network::network_listener::NetworkListener;
use rucher::reporting::event::{AuthMechanism, CloseReason, CredentialAttempt, Event, EventKind};
use rucher::reporting::relay::ReportingRelay;
use rucher::reporting::sinks::MemorySink;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use uuid::Uuid;

struct Honeypot {
    relay: ReportingRelay,
    sink: Arc<MemorySink>,
    listener: NetworkListener,
    addr: SocketAddr,
}

impl Honeypot {
    async fn start(max_attempts: u32) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let relay = ReportingRelay::new(256);
        let sink = Arc::new(MemorySink::new());
        relay.register_sink(sink.clone());
        relay.start().unwrap();

        let config = CapabilitiesConfig {
            imap: Some(CapabilityConfig {
                enabled: true,
                port: 0,
                timeout: 30,
                protocol_specific_data: ImapOptions {
                    max_attempts,
                    banner: "* OK IMAP4rev1 Server Ready".to_string(),
                },
            }),
        };
        let capabilities = build_capabilities(&config, &relay.handle());

        let mut listener = NetworkListener::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let addrs = listener.bind_capabilities(&capabilities).unwrap();

        Self {
            relay,
            sink,
            listener,
            addr: addrs[0],
        }
    }

    /// Stops everything and returns the events grouped by session, in arrival order.
    async fn stop(mut self) -> Vec<Vec<Event>> {
        self.listener.shutdown().await;
        self.relay.stop().await.unwrap();

        let mut sessions: Vec<(Uuid, Vec<Event>)> = Vec::new();
        for event in self.sink.events() {
            match sessions.iter_mut().find(|(id, _)| *id == event.session_id) {
                Some((_, events)) => events.push(event),
                None => sessions.push((event.session_id, vec![event])),
            }
        }
        sessions.into_iter().map(|(_, events)| events).collect()
    }
}

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (read_half, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut client = Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        };
        assert_eq!(client.line().await.as_deref(), Some("* OK IMAP4rev1 Server Ready"));
        client
    }

    async fn line(&mut self) -> Option<String> {
        self.lines.next_line().await.unwrap()
    }

    async fn send(&mut self, line: &str) -> Option<String> {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .unwrap();
        self.line().await
    }

    async fn logout(mut self, tag: &str) {
        assert_eq!(
            self.send(&format!("{} LOGOUT", tag)).await.as_deref(),
            Some("* BYE IMAP4rev1 Server logging out")
        );
        assert_eq!(
            self.line().await,
            Some(format!("{} OK LOGOUT completed", tag))
        );
        assert_eq!(self.line().await, None);
    }
}

fn credentials(events: &[Event]) -> Vec<CredentialAttempt> {
    events
        .iter()
        .filter_map(|event| match &event.kind {
            EventKind::LoginAttempt(attempt) => Some(attempt.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn reference_scenario() {
    let honeypot = Honeypot::start(3).await;

    let mut login = Client::connect(honeypot.addr).await;
    assert_eq!(
        login.send("a1 LOGIN kajoj_admin thebestpassword").await.as_deref(),
        Some("a1 NO Authentication failed")
    );
    assert_eq!(
        login
            .send("a2 LOGIN \"kajoj_admin\" \"the best password\"")
            .await
            .as_deref(),
        Some("a2 NO Authentication failed")
    );
    login.logout("a3").await;

    let mut plain = Client::connect(honeypot.addr).await;
    assert_eq!(plain.send("b1 AUTHENTICATE PLAIN").await.as_deref(), Some("+ "));
    assert_eq!(
        plain.send("AGtham9qX2FkbWluAHRoZWJlc3RwYXNzd29yZA==").await.as_deref(),
        Some("b1 NO Authentication failed")
    );
    assert_eq!(plain.send("b2 AUTHENTICATE PLAIN").await.as_deref(), Some("+ "));
    assert_eq!(
        plain
            .send("ANC/0LDQudGC0L7QvQDQvdCw0LjQu9GD0YfRiNC40LnQv9Cw0YDQvtC70Yw=")
            .await
            .as_deref(),
        Some("b2 NO Authentication failed")
    );
    plain.logout("b3").await;

    let mut malformed = Client::connect(honeypot.addr).await;
    assert_eq!(
        malformed.send("c1 AUTHENTICATE PLAIN").await.as_deref(),
        Some("+ ")
    );
    assert_eq!(
        malformed
            .send("a2Fqb2pfYWRtaW4AdGhlIGJlc3QgcGFzc3dvcmQ=")
            .await
            .as_deref(),
        Some("c1 BAD invalid command")
    );
    malformed.logout("c2").await;

    let sessions = honeypot.stop().await;
    assert_eq!(sessions.len(), 3);

    assert_eq!(
        credentials(&sessions[0]),
        vec![
            CredentialAttempt::new(AuthMechanism::Login, "kajoj_admin", "thebestpassword"),
            CredentialAttempt::new(AuthMechanism::Login, "kajoj_admin", "the best password"),
        ]
    );
    assert_eq!(
        credentials(&sessions[1]),
        vec![
            CredentialAttempt::new(AuthMechanism::Plain, "kajoj_admin", "thebestpassword"),
            CredentialAttempt::new(AuthMechanism::Plain, "пайтон", "наилучшийпароль"),
        ]
    );
    assert!(credentials(&sessions[2]).is_empty());

    for (events, attempts) in sessions.iter().zip([2, 2, 0]) {
        assert_eq!(events[0].kind, EventKind::SessionOpened);
        assert_eq!(
            events.last().unwrap().kind,
            EventKind::SessionClosed {
                reason: CloseReason::ClientLogout,
                attempts
            }
        );
        assert!(events.iter().all(|e| e.protocol == "imap"));
    }
}

#[tokio::test]
async fn third_failure_disconnects_whatever_the_mechanism() {
    let honeypot = Honeypot::start(3).await;

    let mut client = Client::connect(honeypot.addr).await;
    assert_eq!(
        client.send("t1 AUTHENTICATE PLAIN").await.as_deref(),
        Some("+ ")
    );
    assert_eq!(
        client.send("AGFkbWluAHNlY3JldA==").await.as_deref(),
        Some("t1 NO Authentication failed")
    );
    assert_eq!(
        client.send("t2 LOGIN root toor").await.as_deref(),
        Some("t2 NO Authentication failed")
    );
    assert_eq!(
        client.send("t3 AUTHENTICATE LOGIN").await.as_deref(),
        Some("+ VXNlcm5hbWU6")
    );
    assert_eq!(
        client.send("a2Fqb2pfYWRtaW4=").await.as_deref(),
        Some("+ UGFzc3dvcmQ6")
    );
    assert_eq!(
        client.send("dGhlYmVzdHBhc3N3b3Jk").await.as_deref(),
        Some("t3 NO Authentication failed")
    );
    assert_eq!(
        client.line().await.as_deref(),
        Some("* BYE Too many authentication failures")
    );
    assert_eq!(client.line().await, None);

    let sessions = honeypot.stop().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(credentials(&sessions[0]).len(), 3);
    assert_eq!(
        sessions[0].last().unwrap().kind,
        EventKind::SessionClosed {
            reason: CloseReason::AttemptsExhausted,
            attempts: 3
        }
    );
}

#[tokio::test]
async fn concurrent_sessions_keep_their_own_counters() {
    let honeypot = Honeypot::start(2).await;

    let mut first = Client::connect(honeypot.addr).await;
    let mut second = Client::connect(honeypot.addr).await;

    assert_eq!(
        first.send("x1 LOGIN alice one").await.as_deref(),
        Some("x1 NO Authentication failed")
    );
    assert_eq!(
        second.send("y1 LOGIN bob one").await.as_deref(),
        Some("y1 NO Authentication failed")
    );
    assert_eq!(
        first.send("x2 CAPABILITY").await.as_deref(),
        Some("* CAPABILITY IMAP4rev1 AUTH=PLAIN AUTH=LOGIN")
    );
    assert_eq!(first.line().await.as_deref(), Some("x2 OK CAPABILITY completed"));
    first.logout("x3").await;

    assert_eq!(
        second.send("y2 LOGIN bob two").await.as_deref(),
        Some("y2 NO Authentication failed")
    );
    assert_eq!(
        second.line().await.as_deref(),
        Some("* BYE Too many authentication failures")
    );

    let sessions = honeypot.stop().await;
    let closes: Vec<_> = sessions
        .iter()
        .map(|events| events.last().unwrap().kind.clone())
        .collect();
    assert!(closes.contains(&EventKind::SessionClosed {
        reason: CloseReason::ClientLogout,
        attempts: 1
    }));
    assert!(closes.contains(&EventKind::SessionClosed {
        reason: CloseReason::AttemptsExhausted,
        attempts: 2
    }));
}

#[tokio::test]
async fn capability_serves_any_stream() {
    let relay = ReportingRelay::new(16);
    let sink = Arc::new(MemorySink::new());
    relay.register_sink(sink.clone());
    relay.start().unwrap();

    let imap = Imap::new(
        CapabilityConfig {
            enabled: true,
            port: 143,
            timeout: 30,
            protocol_specific_data: ImapOptions::default(),
        },
        relay.handle(),
    );
    let (client, server) = tokio::io::duplex(1024);
    let peer: SocketAddr = "192.0.2.10:50000".parse().unwrap();
    let session = tokio::spawn(async move { imap.handle_session(Box::new(server), peer).await });

    let (read_half, mut write_half) = tokio::io::split(client);
    let mut lines = BufReader::new(read_half).lines();
    lines.next_line().await.unwrap();
    write_half.shutdown().await.unwrap();

    assert_eq!(session.await.unwrap(), CloseReason::ClientDisconnect);
    relay.stop().await.unwrap();
    assert_eq!(sink.len(), 2);
    assert!(sink.events().iter().all(|e| e.peer == peer));
}
