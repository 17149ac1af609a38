//! Network state: configuration plus what the server told us.

use std::sync::Arc;

use parking_lot::RwLock;
use sbi_proto::{CaseMapping, PrefixSpec, rfc};

use crate::config::{NetworkConfig, ProfileConfig};
use crate::connection::IrcConnection;

/// Attributes reported by the server.
///
/// Everything except `host`, `ip_address` and `port` stays empty or zero
/// until 005 arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub host: String,
    pub ip_address: String,
    pub port: u16,
    /// PREFIX mode letters, e.g. `ov`.
    pub chan_mode_chars: String,
    /// PREFIX symbols, e.g. `@+`.
    pub chan_mode_symbols: String,
    pub chan_types: String,
    /// CASEMAPPING name, e.g. `rfc1459`.
    pub casemapping: String,
    /// CHANMODES class A (list modes).
    pub supported_modes_a: String,
    /// CHANMODES class B (always take a parameter).
    pub supported_modes_b: String,
    /// CHANMODES class C (parameter when set).
    pub supported_modes_c: String,
    /// CHANMODES class D (never take a parameter).
    pub supported_modes_d: String,
    /// NETWORK name.
    pub network: String,
    /// Server name from the 001 sender.
    pub server: String,
    pub max_len_away: u16,
    pub max_len_channel: u16,
    pub max_len_kickmsg: u16,
    pub max_len_nick: u16,
    pub max_len_topic: u16,
    pub max_num_modes: u16,
    pub max_num_channels: u16,
}

impl ServerInfo {
    /// Fill what the server never advertised with RFC 1459 values.
    pub fn apply_rfc_defaults(&mut self) {
        if self.max_num_modes == 0 {
            self.max_num_modes = rfc::RFC1459_MODES as u16;
        }
        if self.max_len_nick == 0 {
            self.max_len_nick = rfc::RFC1459_NICK_LEN as u16;
        }
        if self.max_len_channel == 0 {
            self.max_len_channel = rfc::RFC1459_CHANNEL_LEN as u16;
        }
        if self.chan_types.is_empty() {
            self.chan_types = rfc::RFC1459_CHAN_TYPES.to_string();
        }
        if self.casemapping.is_empty() {
            self.casemapping = rfc::RFC1459_CASEMAPPING.to_string();
        }
    }

    /// The PREFIX mapping, or RFC 1459 `(ov)@+` while none was reported.
    pub fn prefix_spec(&self) -> PrefixSpec<'_> {
        if self.chan_mode_chars.is_empty() || self.chan_mode_symbols.is_empty() {
            return PrefixSpec::RFC1459;
        }
        PrefixSpec {
            modes: &self.chan_mode_chars,
            prefixes: &self.chan_mode_symbols,
        }
    }

    pub fn case_mapping(&self) -> CaseMapping {
        CaseMapping::from_token(&self.casemapping)
    }

    /// Forget everything learned from the server, keeping the endpoint.
    pub fn reset_reported(&mut self) {
        *self = Self {
            host: std::mem::take(&mut self.host),
            ip_address: std::mem::take(&mut self.ip_address),
            port: self.port,
            ..Self::default()
        };
    }
}

/// Live attributes of the local client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub autoauth_service: String,
    pub autoauth_password: String,
    pub hostmask: String,
    /// Nickname the server currently knows us by (or the one requested).
    pub nickname: String,
    pub kick_reason: String,
    pub part_reason: String,
    pub quit_reason: String,
    /// Configured nicknames, in preference order.
    pub nicknames: Vec<String>,
}

impl ClientInfo {
    fn from_profile(profile: &ProfileConfig) -> Self {
        Self {
            autoauth_service: profile.autoident_service.clone(),
            autoauth_password: profile.autoident_password.clone(),
            hostmask: String::new(),
            nickname: String::new(),
            kick_reason: profile.kick_reason.clone(),
            part_reason: profile.part_reason.clone(),
            quit_reason: profile.quit_reason.clone(),
            nicknames: profile.nicknames.clone(),
        }
    }
}

/// A user-named grouping of connections sharing one profile and network
/// configuration.
#[derive(Debug)]
pub struct IrcNetwork {
    group_name: String,
    config: RwLock<NetworkConfig>,
    profile: RwLock<ProfileConfig>,
    server: RwLock<ServerInfo>,
    client: RwLock<ClientInfo>,
    connections: RwLock<Vec<Arc<IrcConnection>>>,
}

impl IrcNetwork {
    pub(crate) fn new(group_name: &str) -> Self {
        Self {
            group_name: group_name.to_string(),
            config: RwLock::new(NetworkConfig::default()),
            profile: RwLock::new(ProfileConfig::default()),
            server: RwLock::new(ServerInfo::default()),
            client: RwLock::new(ClientInfo::default()),
            connections: RwLock::new(Vec::new()),
        }
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Install a copy of the static configuration.
    pub fn configure(&self, network: &NetworkConfig, profile: &ProfileConfig) {
        *self.config.write() = network.clone();
        *self.profile.write() = profile.clone();
        *self.client.write() = ClientInfo::from_profile(profile);
    }

    pub fn config(&self) -> NetworkConfig {
        self.config.read().clone()
    }

    pub fn profile(&self) -> ProfileConfig {
        self.profile.read().clone()
    }

    pub fn server(&self) -> ServerInfo {
        self.server.read().clone()
    }

    pub fn client(&self) -> ClientInfo {
        self.client.read().clone()
    }

    /// Mutate the server record under its lock.
    pub fn with_server<R>(&self, f: impl FnOnce(&mut ServerInfo) -> R) -> R {
        f(&mut self.server.write())
    }

    /// Mutate the client record under its lock.
    pub fn with_client<R>(&self, f: impl FnOnce(&mut ClientInfo) -> R) -> R {
        f(&mut self.client.write())
    }

    pub fn nickname(&self) -> String {
        self.client.read().nickname.clone()
    }

    /// True if `nickname` is ours under the server's case mapping.
    pub fn is_own_nick(&self, nickname: &str) -> bool {
        let own = self.client.read().nickname.clone();
        self.server.read().case_mapping().equals(&own, nickname)
    }

    pub fn set_nickname(&self, nickname: &str) {
        self.client.write().nickname = nickname.to_string();
    }

    pub(crate) fn attach(&self, connection: Arc<IrcConnection>) {
        self.connections.write().push(connection);
    }

    pub(crate) fn detach(&self, id: u32) -> Option<Arc<IrcConnection>> {
        let mut conns = self.connections.write();
        let idx = conns.iter().position(|c| c.id() == id)?;
        Some(conns.remove(idx))
    }

    pub fn connections(&self) -> Vec<Arc<IrcConnection>> {
        self.connections.read().clone()
    }
}
