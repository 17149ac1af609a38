//! Integration tests for the connection lifecycle.
//!
//! Runs a real engine with its parser task against a scripted server on
//! the loopback interface: handshake, registration, automatic join, PING,
//! CTCP and disconnects.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{MockPeer, MockServer, RecordingListener, add_network};
use parking_lot::Mutex;
use sbi_irc::config::{EngineConfig, NetworkConfig, ServerConfig};
use sbi_irc::connection::{Connector, Endpoint, Transport};
use sbi_irc::{ConnState, EventKind, IrcConnection, IrcEngine, IrcResult, IrcStatus};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::time::{Instant, sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

/// Hands out one in-memory stream instead of dialing.
struct DuplexConnector {
    stream: Mutex<Option<DuplexStream>>,
    dialed: Mutex<Option<Endpoint>>,
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn connect(&self, endpoint: &Endpoint) -> IrcResult<Transport> {
        *self.dialed.lock() = Some(endpoint.clone());
        let stream = self
            .stream
            .lock()
            .take()
            .ok_or(IrcStatus::InvalidState("stream already used"))?;
        Ok(Transport {
            stream: Box::new(stream),
            fingerprint: None,
        })
    }
}

struct Session {
    engine: Arc<IrcEngine>,
    conn: Arc<IrcConnection>,
    events: Arc<RecordingListener>,
    peer: MockPeer,
}

/// Connect a fresh engine to `server` and read the registration handshake.
async fn connect(server: &MockServer) -> anyhow::Result<(Session, Vec<String>)> {
    let engine = IrcEngine::new(EngineConfig {
        client_version: "sbi-test 1.0".into(),
        ..EngineConfig::default()
    });
    let events = Arc::new(RecordingListener::default());
    engine.add_listener(events.clone());
    engine.spawn_parser();

    let server_config = ServerConfig {
        hostname: "127.0.0.1".into(),
        port: server.port()?,
        ..ServerConfig::default()
    };
    let network = NetworkConfig {
        network_name: "Local".into(),
        auto_join_channels: true,
        channels: vec!["#sbi".into()],
        servers: vec![server_config.clone()],
        ..NetworkConfig::default()
    };
    let conn = add_network(&engine, network.clone(), &["trez", "trez_"]);

    conn.connect(&network, &server_config)
        .await
        .map_err(|e| anyhow::anyhow!("connect: {e}"))?;
    let mut peer = server.accept().await?;
    let handshake = peer.recv_until(|l| l.starts_with("USER ")).await?;

    Ok((
        Session {
            engine,
            conn,
            events,
            peer,
        },
        handshake,
    ))
}

/// Poll until `pred` holds for the connection state.
async fn wait_state(conn: &IrcConnection, pred: impl Fn(ConnState) -> bool) -> anyhow::Result<()> {
    let deadline = Instant::now() + WAIT;
    while !pred(conn.state()) {
        if Instant::now() > deadline {
            anyhow::bail!("state stuck at {:?}", conn.state());
        }
        sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

async fn register(session: &mut Session) -> anyhow::Result<()> {
    let peer = &mut session.peer;
    peer.send_raw(":irc.example.org NOTICE AUTH :*** Looking up your hostname")
        .await?;
    peer.send_raw(":irc.example.org 001 trez :Welcome to the Local Network trez")
        .await?;
    peer.send_raw(
        ":irc.example.org 005 trez CHANTYPES=# PREFIX=(ov)@+ CHANMODES=beI,k,l,imnpst :are supported by this server",
    )
    .await?;
    peer.send_raw(":irc.example.org 376 trez :End of /MOTD command.")
        .await?;
    session.events.wait_for(EventKind::ConnectionReady, WAIT).await?;
    Ok(())
}

#[tokio::test]
async fn full_session() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let (mut session, handshake) = connect(&server).await?;

    assert_eq!(handshake[0], "CAP LS");
    assert!(handshake.iter().any(|l| l == "CAP END"));
    assert!(handshake.iter().any(|l| l == "NICK trez"));
    assert!(session.conn.state().contains(ConnState::INIT_SENT));

    register(&mut session).await?;
    assert!(session.conn.is_active());
    assert_eq!(session.peer.recv().await?, "JOIN #sbi");

    // join echo and NAMES
    session
        .peer
        .send_raw(":trez!tirc@localhost JOIN :#sbi")
        .await?;
    session
        .peer
        .send_raw(":irc.example.org 353 trez = #sbi :trez @alice +bob")
        .await?;
    session
        .peer
        .send_raw(":irc.example.org 366 trez #sbi :End of /NAMES list.")
        .await?;
    session.events.wait_for(EventKind::EndOfNames, WAIT).await?;

    let channel = session.conn.get_channel("#sbi").expect("joined");
    assert!(channel.is_active());
    assert_eq!(channel.users(), ["trez", "alice", "bob"]);

    // answered by the read loop itself
    session.peer.send_raw("PING :lagcheck").await?;
    assert_eq!(session.peer.recv().await?, "PONG :lagcheck");

    session
        .peer
        .send_raw(":alice!a@example.net PRIVMSG trez :\x01VERSION\x01")
        .await?;
    assert_eq!(
        session.peer.recv().await?,
        "NOTICE alice :\x01VERSION sbi-test 1.0\x01"
    );

    session
        .peer
        .send_raw(":alice!a@example.net PRIVMSG #sbi :hello bot")
        .await?;
    session.events.wait_for(EventKind::Privmsg, WAIT).await?;

    let stats = session.conn.stats();
    assert!(stats.bytes_recv > 0);
    assert!(stats.bytes_sent > 0);
    assert!(stats.last_data.is_some());

    // server hangs up
    session.peer.close().await?;
    wait_state(&session.conn, |s| s.contains(ConnState::DISCONNECTED)).await?;

    session.engine.shutdown().await;
    assert!(session.engine.is_quitting());
    Ok(())
}

#[tokio::test]
async fn nickname_collision_during_registration() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let (mut session, _) = connect(&server).await?;

    session
        .peer
        .send_raw(":irc.example.org 433 * trez :Nickname is already in use")
        .await?;
    assert_eq!(session.peer.recv().await?, "NICK trez_");

    session
        .peer
        .send_raw(":irc.example.org 001 trez_ :Welcome to the Local Network trez_")
        .await?;
    session.events.wait_for(EventKind::Welcome, WAIT).await?;
    assert_eq!(session.conn.network().unwrap().nickname(), "trez_");

    session.engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn cleanup_sends_quit_and_resets() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let (mut session, _) = connect(&server).await?;
    register(&mut session).await?;
    assert_eq!(session.peer.recv().await?, "JOIN #sbi");

    session.conn.cleanup().await;

    let quit = session.peer.recv().await?;
    assert!(quit.starts_with("QUIT :"), "{quit}");
    assert!(!session.conn.is_active());
    assert!(session.conn.channels().is_empty());
    assert!(session.conn.pending_sends().is_empty());

    session.engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn server_error_line_disconnects() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let (mut session, _) = connect(&server).await?;
    register(&mut session).await?;

    session
        .peer
        .send_raw("ERROR :Closing Link: (connection reset)")
        .await?;
    wait_state(&session.conn, |s| s == ConnState::DISCONNECTED).await?;

    session.engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn connect_to_closed_port_fails() -> anyhow::Result<()> {
    let port = {
        let server = MockServer::bind().await?;
        server.port()?
    };

    let engine = IrcEngine::new(EngineConfig::default());
    let server_config = ServerConfig {
        hostname: "127.0.0.1".into(),
        port,
        ..ServerConfig::default()
    };
    let network = NetworkConfig {
        network_name: "Nowhere".into(),
        servers: vec![server_config.clone()],
        ..NetworkConfig::default()
    };
    let conn = add_network(&engine, network.clone(), &["trez"]);

    assert!(conn.connect(&network, &server_config).await.is_err());
    assert_eq!(conn.state(), ConnState::DISCONNECTED);
    Ok(())
}

#[tokio::test]
async fn shutdown_is_bounded_when_the_server_stops_reading() -> anyhow::Result<()> {
    let engine = IrcEngine::new(EngineConfig {
        join_timeout_ms: 200,
        ..EngineConfig::default()
    });
    let events = Arc::new(RecordingListener::default());
    engine.add_listener(events.clone());
    engine.spawn_parser();

    let server_config = ServerConfig {
        hostname: "127.0.0.1".into(),
        port: 6667,
        ..ServerConfig::default()
    };
    let network = NetworkConfig {
        network_name: "Stalled".into(),
        servers: vec![server_config.clone()],
        ..NetworkConfig::default()
    };
    let conn = add_network(&engine, network.clone(), &["trez"]);

    // the server side is written to but never read
    let (client, mut server) = tokio::io::duplex(64);
    let connector = Arc::new(DuplexConnector {
        stream: Mutex::new(Some(client)),
        dialed: Mutex::new(None),
    });
    conn.set_connector(connector.clone());
    conn.connect(&network, &server_config)
        .await
        .map_err(|e| anyhow::anyhow!("connect: {e}"))?;
    assert_eq!(
        connector.dialed.lock().as_ref().map(|e| e.address.clone()),
        Some("127.0.0.1:6667".to_string())
    );

    server
        .write_all(b":irc.example.org 001 trez :Welcome to the Stalled Network trez\r\n")
        .await?;
    events.wait_for(EventKind::Welcome, WAIT).await?;

    for i in 0..200 {
        conn.add_to_send_queue(format!("PRIVMSG #flood :line {i}"))
            .map_err(|e| anyhow::anyhow!("queue: {e}"))?;
    }
    sleep(Duration::from_millis(100)).await;

    timeout(WAIT, engine.shutdown()).await?;
    assert_eq!(conn.state(), ConnState::DISCONNECTED);
    assert!(conn.pending_sends().is_empty());
    Ok(())
}
