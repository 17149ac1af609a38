//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("network {0} refers to unknown profile {1}")]
    UnknownProfile(String, String),
    #[error("profile {0} has no nicknames")]
    NoNicknames(String),
    #[error("network {0} has no servers")]
    NoServers(String),
    #[error("network {0}: server {1} has neither hostname nor ip_address")]
    ServerWithoutAddress(String, usize),
    #[error("duplicate network name {0}")]
    DuplicateNetwork(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for profile in &config.profiles {
        if profile.nicknames.is_empty() {
            errors.push(ValidationError::NoNicknames(profile.profile_name.clone()));
        }
    }

    for (idx, network) in config.networks.iter().enumerate() {
        let name = &network.network_name;

        if config.networks[..idx].iter().any(|n| &n.network_name == name) {
            errors.push(ValidationError::DuplicateNetwork(name.clone()));
        }
        if config.profile(&network.profile_name).is_none() {
            errors.push(ValidationError::UnknownProfile(
                name.clone(),
                network.profile_name.clone(),
            ));
        }
        if network.servers.is_empty() {
            errors.push(ValidationError::NoServers(name.clone()));
        }
        for (i, server) in network.servers.iter().enumerate() {
            if server.hostname.is_empty() && server.ip_address.is_empty() {
                errors.push(ValidationError::ServerWithoutAddress(name.clone(), i));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkConfig, ProfileConfig, ServerConfig};

    fn valid() -> Config {
        Config {
            profiles: vec![ProfileConfig {
                profile_name: "p".into(),
                nicknames: vec!["trez".into()],
                ..ProfileConfig::default()
            }],
            networks: vec![NetworkConfig {
                network_name: "n".into(),
                profile_name: "p".into(),
                servers: vec![ServerConfig {
                    hostname: "irc.example.org".into(),
                    ..ServerConfig::default()
                }],
                ..NetworkConfig::default()
            }],
            ..Config::default()
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid();
        config.profiles[0].nicknames.clear();
        config.networks[0].profile_name = "missing".into();
        config.networks[0].servers[0].hostname.clear();
        let dup = config.networks[0].clone();
        config.networks.push(dup);

        let errors = validate(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::NoNicknames("p".into())));
        assert!(errors.contains(&ValidationError::UnknownProfile(
            "n".into(),
            "missing".into()
        )));
        assert!(errors.contains(&ValidationError::ServerWithoutAddress("n".into(), 0)));
        assert!(errors.contains(&ValidationError::DuplicateNetwork("n".into())));
    }
}
