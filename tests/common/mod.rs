//! Integration test common infrastructure.
//!
//! Provides a scripted IRC server, a recording listener, and helpers for
//! building an engine with one registered connection.

pub mod listener;
pub mod server;

use std::sync::Arc;

use sbi_irc::config::{EngineConfig, NetworkConfig, ProfileConfig};
use sbi_irc::{IrcConnection, IrcEngine, IrcResult};

#[allow(unused_imports)]
pub use listener::RecordingListener;
#[allow(unused_imports)]
pub use server::{MockPeer, MockServer};

/// Engine, connection and recorder for one network named `network`.
#[allow(dead_code)]
pub struct Harness {
    pub engine: Arc<IrcEngine>,
    pub conn: Arc<IrcConnection>,
    pub events: Arc<RecordingListener>,
}

impl Harness {
    /// A network using `nicknames`, with the first one as current nickname.
    #[allow(dead_code)]
    pub fn new(network: NetworkConfig, nicknames: &[&str]) -> Self {
        let engine = IrcEngine::new(EngineConfig {
            client_version: "sbi-test 1.0".into(),
            ..EngineConfig::default()
        });
        let events = Arc::new(RecordingListener::default());
        engine.add_listener(events.clone());

        let conn = add_network(&engine, network, nicknames);
        Self {
            engine,
            conn,
            events,
        }
    }

    /// Decode and handle one line as the parser task would.
    #[allow(dead_code)]
    pub fn feed(&self, line: &str) -> IrcResult {
        sbi_irc::parser::process_line(&self.engine, &self.conn, line)
    }

    /// Feed 001 so the connection is ACTIVE.
    #[allow(dead_code)]
    pub fn register(&self) {
        let nick = self.conn.network().map(|n| n.nickname()).unwrap_or_default();
        self.feed(&format!(
            ":irc.example.org 001 {nick} :Welcome to the Example Network {nick}"
        ))
        .expect("welcome");
    }

    /// Register and join `channel` with the given NAMES reply.
    #[allow(dead_code)]
    pub fn join(&self, channel: &str, names: &str) {
        let nick = self.conn.network().map(|n| n.nickname()).unwrap_or_default();
        self.feed(&format!(":{nick}!tirc@bot.example.org JOIN :{channel}"))
            .expect("join");
        self.feed(&format!(":irc.example.org 353 {nick} = {channel} :{names}"))
            .expect("names");
        self.feed(&format!(
            ":irc.example.org 366 {nick} {channel} :End of /NAMES list."
        ))
        .expect("end of names");
    }
}

/// Create and configure another network on `engine`, returning its connection.
pub fn add_network(
    engine: &Arc<IrcEngine>,
    network: NetworkConfig,
    nicknames: &[&str],
) -> Arc<IrcConnection> {
    let profile = ProfileConfig {
        profile_name: "bot".into(),
        nicknames: nicknames.iter().map(|n| n.to_string()).collect(),
        ..ProfileConfig::default()
    };
    let network = NetworkConfig {
        profile_name: "bot".into(),
        ..network
    };
    let net = engine
        .create_configured_network(&network, &profile)
        .expect("network");
    if let Some(first) = nicknames.first() {
        net.set_nickname(first);
    }
    engine
        .create_connection(&network.network_name)
        .expect("connection")
}

/// Minimal network config named `name`.
#[allow(dead_code)]
pub fn network(name: &str) -> NetworkConfig {
    NetworkConfig {
        network_name: name.into(),
        ..NetworkConfig::default()
    }
}
