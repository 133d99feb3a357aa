//! Discovery of a live local Tor SOCKS5 endpoint.

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

use crate::constants::{TOR_PROXY_HOST, TOR_PROXY_PORTS};

/// Default connect timeout for each probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("Neither the Tor daemon (9050) nor Tor Browser (9150) is running. Check your Tor connection.")]
    NotFound,
}

/// Probe the well-known Tor ports and return the first live proxy address.
///
/// # Errors
///
/// Returns [`ProxyError::NotFound`] when no candidate accepts a connection.
pub async fn locate_proxy() -> Result<String, ProxyError> {
    locate_proxy_on(TOR_PROXY_HOST, &TOR_PROXY_PORTS, PROBE_TIMEOUT).await
}

/// Probe `ports` on `host` in order, returning `socks5://host:port` for
/// the first that accepts a TCP connection within `timeout`.
///
/// # Errors
///
/// Returns [`ProxyError::NotFound`] when no candidate accepts a connection.
pub async fn locate_proxy_on(
    host: &str,
    ports: &[u16],
    timeout: Duration,
) -> Result<String, ProxyError> {
    for port in ports {
        let address = format!("{host}:{port}");
        match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                debug!(address = %address, "Found live SOCKS5 proxy");
                return Ok(format!("socks5://{address}"));
            }
            Ok(Err(e)) => debug!(address = %address, "Proxy probe failed: {e}"),
            Err(_) => debug!(address = %address, "Proxy probe timed out"),
        }
    }

    Err(ProxyError::NotFound)
}

/// Use the explicit proxy when one is configured, otherwise probe for one.
///
/// # Errors
///
/// Returns [`ProxyError::NotFound`] when there is no override and no live proxy.
pub async fn resolve_proxy(
    proxy_override: Option<&str>,
    timeout: Duration,
) -> Result<String, ProxyError> {
    match proxy_override.map(str::trim).filter(|p| !p.is_empty()) {
        Some(explicit) => Ok(explicit.to_string()),
        None => locate_proxy_on(TOR_PROXY_HOST, &TOR_PROXY_PORTS, timeout).await,
    }
}
