//! Port selection for the HTTP transport.

use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::warn;

/// Consecutive ports tried after the configured one is taken
const FALLBACK_SPAN: u16 = 10;

fn parse_addr(host: &str, port: u16) -> io::Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Bind and immediately release `host:port`, returning the port actually bound
async fn try_bind(host: &str, port: u16) -> io::Result<u16> {
    let listener = TcpListener::bind(parse_addr(host, port)?).await?;
    listener.local_addr().map(|addr| addr.port())
}

/// Succeed only if exactly `port` can be bound on `host`.
pub async fn bind_port_strict(host: &str, port: u16) -> io::Result<u16> {
    try_bind(host, port).await
}

/// Pick a port for the gateway, preferring the configured one.
///
/// Falls back to the next few ports and finally to an OS-assigned port.
pub async fn find_available_port(host: &str, preferred: u16) -> io::Result<u16> {
    // Reject a malformed host up front
    parse_addr(host, preferred)?;

    let candidates = (0..=FALLBACK_SPAN).map(|offset| preferred.saturating_add(offset));
    for port in candidates {
        if try_bind(host, port).await.is_ok() {
            if port != preferred {
                warn!(preferred, actual = port, "Configured port busy, using neighbour");
            }
            return Ok(port);
        }
    }

    let port = try_bind(host, 0).await?;
    warn!(preferred, actual = port, "Configured port range busy, using OS-assigned port");
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_strict_bind_refuses_taken_port() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = holder.local_addr().unwrap().port();

        assert!(bind_port_strict("127.0.0.1", taken).await.is_err());
    }

    #[tokio::test]
    async fn test_fallback_skips_taken_port() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = holder.local_addr().unwrap().port();

        let port = find_available_port("127.0.0.1", taken).await.unwrap();
        assert_ne!(port, taken);
        assert!(port > 0);
    }

    #[tokio::test]
    async fn test_malformed_host_is_rejected() {
        let err = find_available_port("not a host[", 8080).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
