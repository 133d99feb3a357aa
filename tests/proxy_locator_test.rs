//! Proxy discovery against real local sockets.

use std::time::Duration;

use onion_forum_scanner::scanner::{locate_proxy_on, resolve_proxy, ProxyError};
use tokio::net::TcpListener;

const PROBE: Duration = Duration::from_millis(500);

/// A port that nothing listens on.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_finds_listening_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let proxy = locate_proxy_on("127.0.0.1", &[port], PROBE).await.unwrap();
    assert_eq!(proxy, format!("socks5://127.0.0.1:{port}"));
}

#[tokio::test]
async fn test_skips_closed_port_for_next_candidate() {
    let closed = closed_port().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();

    let proxy = locate_proxy_on("127.0.0.1", &[closed, open], PROBE)
        .await
        .unwrap();
    assert_eq!(proxy, format!("socks5://127.0.0.1:{open}"));
}

#[tokio::test]
async fn test_first_live_candidate_wins() {
    let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let second = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ports = [
        first.local_addr().unwrap().port(),
        second.local_addr().unwrap().port(),
    ];

    let proxy = locate_proxy_on("127.0.0.1", &ports, PROBE).await.unwrap();
    assert_eq!(proxy, format!("socks5://127.0.0.1:{}", ports[0]));
}

#[tokio::test]
async fn test_no_live_candidate() {
    let closed = closed_port().await;
    let result = locate_proxy_on("127.0.0.1", &[closed], PROBE).await;
    assert_eq!(result, Err(ProxyError::NotFound));
}

#[tokio::test]
async fn test_override_is_trimmed() {
    let explicit = resolve_proxy(Some(" socks5://10.1.1.1:9050 "), PROBE)
        .await
        .unwrap();
    assert_eq!(explicit, "socks5://10.1.1.1:9050");
}
