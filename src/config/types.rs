//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::{
    default_autoident_service, default_client_version, default_encoding, default_ident,
    default_join_timeout_ms, default_port, default_quit_reason, default_real_name,
    default_true, default_user_mode,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Engine-wide settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Identity profiles, referenced by name from networks.
    #[serde(default, rename = "profile")]
    pub profiles: Vec<ProfileConfig>,
    /// Networks to manage.
    #[serde(default, rename = "network")]
    pub networks: Vec<NetworkConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.iter().find(|p| p.profile_name == name)
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Text sent in reply to CTCP VERSION.
    #[serde(default = "default_client_version")]
    pub client_version: String,
    /// QUIT message used when a profile has none.
    #[serde(default = "default_quit_reason")]
    pub default_quit_reason: String,
    /// Upper bound on waiting for a connection task to stop.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_version: default_client_version(),
            default_quit_reason: default_quit_reason(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

/// Identity used on one or more networks.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Name networks refer to this profile by.
    pub profile_name: String,
    /// USER ident.
    #[serde(default = "default_ident")]
    pub ident: String,
    /// USER realname.
    #[serde(default = "default_real_name")]
    pub real_name: String,
    #[serde(default)]
    pub kick_reason: String,
    #[serde(default)]
    pub part_reason: String,
    #[serde(default)]
    pub quit_reason: String,
    /// Identify to services once registered.
    #[serde(default)]
    pub auto_identify: bool,
    #[serde(default)]
    pub autoident_password: String,
    #[serde(default = "default_autoident_service")]
    pub autoident_service: String,
    /// USER mode bitmask (RFC 2812).
    #[serde(default = "default_user_mode")]
    pub mode: u16,
    /// Nicknames in order of preference.
    #[serde(default)]
    pub nicknames: Vec<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            profile_name: String::new(),
            ident: default_ident(),
            real_name: default_real_name(),
            kick_reason: String::new(),
            part_reason: String::new(),
            quit_reason: String::new(),
            auto_identify: false,
            autoident_password: String::new(),
            autoident_service: default_autoident_service(),
            mode: default_user_mode(),
            nicknames: Vec::new(),
        }
    }
}

/// One IRC server endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Hostname, preferred over `ip_address` when both are set.
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ip_address: String,
    /// Connection password (PASS).
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Wrap the connection in TLS.
    #[serde(default)]
    pub ssl: bool,
}

/// A network: a profile paired with a server list and automation.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub network_name: String,
    /// Profile to connect with.
    pub profile_name: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Accept certificates that fail verification (logged).
    #[serde(default)]
    pub allow_invalid_cert: bool,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    /// Send `commands` once registered.
    #[serde(default)]
    pub auto_exec_commands: bool,
    /// Join `channels` once registered.
    #[serde(default)]
    pub auto_join_channels: bool,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default, rename = "server")]
    pub servers: Vec<ServerConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_name: String::new(),
            profile_name: String::new(),
            encoding: default_encoding(),
            allow_invalid_cert: false,
            auto_connect: true,
            auto_exec_commands: false,
            auto_join_channels: false,
            channels: Vec::new(),
            commands: Vec::new(),
            servers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r##"
[engine]
client_version = "sbi-test 1.0"

[[profile]]
profile_name = "default"
ident = "tirc"
nicknames = ["trez", "trez_", "trez__"]
auto_identify = true
autoident_password = "hunter2"

[[network]]
network_name = "Example"
profile_name = "default"
auto_join_channels = true
channels = ["#test", "#sbi"]

[[network.server]]
hostname = "irc.example.org"
port = 6697
ssl = true
"##;

    #[test]
    fn parse_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.engine.client_version, "sbi-test 1.0");
        assert_eq!(config.engine.join_timeout_ms, 1000);

        let profile = config.profile("default").unwrap();
        assert_eq!(profile.ident, "tirc");
        assert_eq!(profile.real_name, "Social Bot Interface");
        assert_eq!(profile.autoident_service, "NickServ");
        assert_eq!(profile.nicknames.len(), 3);
        assert_eq!(profile.mode, 8);

        let network = &config.networks[0];
        assert!(network.auto_connect);
        assert!(!network.allow_invalid_cert);
        assert_eq!(network.servers[0].port, 6697);
        assert!(network.servers[0].ssl);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.networks[0].network_name, "Example");
    }

    #[test]
    fn load_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[network]]\nnetwork_name = 5\n").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/sbi.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
