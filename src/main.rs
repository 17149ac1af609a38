//! sbi-irc - Social Bot Interface IRC client
//!
//! Connects every auto-connect network from the configuration file and logs
//! what happens until interrupted.

use std::sync::Arc;

use sbi_irc::config::{self, Config};
use sbi_irc::{IrcEngine, LoggingListener};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    info!(
        networks = config.networks.len(),
        profiles = config.profiles.len(),
        client = %config.engine.client_version,
        "Starting sbi-irc"
    );

    let engine = IrcEngine::new(config.engine.clone());
    engine.add_listener(Arc::new(LoggingListener));
    engine.spawn_parser();

    for network in config.networks.iter().filter(|n| n.auto_connect) {
        let Some(profile) = config.profile(&network.profile_name) else {
            continue;
        };
        let Some(server) = network.servers.first() else {
            continue;
        };

        engine.create_configured_network(network, profile)?;
        let connection = engine.create_connection(&network.network_name)?;
        if let Err(e) = connection.connect(network, server).await {
            warn!(
                network = %network.network_name,
                code = e.error_code(),
                error = %e,
                "Connection failed"
            );
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");
    engine.shutdown().await;

    Ok(())
}
