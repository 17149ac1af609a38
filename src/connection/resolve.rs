//! Server address resolution.

use std::net::{IpAddr, SocketAddr};

use hickory_resolver::TokioResolver;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{IrcResult, IrcStatus};

/// Host name and connectable address of one configured server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub host: String,
    pub addr: SocketAddr,
}

/// Resolve a server entry.
///
/// A configured hostname wins and is looked up forward. Without one, the
/// literal IP address is used and its name found by reverse lookup.
pub async fn resolve_server(server: &ServerConfig) -> IrcResult<Resolved> {
    if !server.hostname.is_empty() {
        let target = format!("{}:{}", server.hostname, server.port);
        let addr = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| IrcStatus::LookupFailed(format!("{target}: {e}")))?
            .next()
            .ok_or_else(|| IrcStatus::LookupFailed(target.clone()))?;
        debug!(host = %server.hostname, addr = %addr, "resolved server");
        return Ok(Resolved {
            host: server.hostname.clone(),
            addr,
        });
    }

    if server.ip_address.is_empty() {
        return Err(IrcStatus::invalid("server has neither hostname nor ip address"));
    }

    let ip: IpAddr = server
        .ip_address
        .parse()
        .map_err(|_| IrcStatus::invalid(format!("bad ip address {}", server.ip_address)))?;
    let host = reverse_lookup(ip).await?;
    debug!(ip = %ip, host = %host, "reverse resolved server");
    Ok(Resolved {
        host,
        addr: SocketAddr::new(ip, server.port),
    })
}

async fn reverse_lookup(ip: IpAddr) -> IrcResult<String> {
    let resolver = TokioResolver::builder_tokio()
        .map(|b| b.build())
        .unwrap_or_else(|_| {
            TokioResolver::builder_with_config(
                ResolverConfig::default(),
                TokioConnectionProvider::default(),
            )
            .build()
        });

    let lookup = resolver
        .reverse_lookup(ip)
        .await
        .map_err(|e| IrcStatus::LookupFailed(format!("{ip}: {e}")))?;
    lookup
        .iter()
        .next()
        .map(|ptr| ptr.to_string().trim_end_matches('.').to_string())
        .ok_or_else(|| IrcStatus::LookupFailed(ip.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hostname_takes_precedence() {
        let server = ServerConfig {
            hostname: "localhost".into(),
            ip_address: "10.0.0.1".into(),
            port: 6697,
            ..ServerConfig::default()
        };
        let resolved = resolve_server(&server).await.unwrap();
        assert_eq!(resolved.host, "localhost");
        assert_eq!(resolved.addr.port(), 6697);
        assert!(resolved.addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn missing_address_is_invalid() {
        let err = resolve_server(&ServerConfig::default()).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_data");

        let bad = ServerConfig {
            ip_address: "not-an-ip".into(),
            ..ServerConfig::default()
        };
        assert_eq!(resolve_server(&bad).await.unwrap_err().error_code(), "invalid_data");
    }
}
