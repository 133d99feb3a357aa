//! Retry behaviour of the fetch stage against a scripted transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use onion_forum_scanner::scanner::{
    fetch_with_retry, FailureKind, FetchError, FetchRequest, FetchedPage, ReqwestTransport,
    RetryPolicy, Transport,
};
use tokio::net::TcpListener;

/// Replays a fixed list of outcomes, one per call.
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<FetchedPage, String>>>,
    calls: AtomicU32,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<FetchedPage, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, _request: &FetchRequest<'_>) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));
        next.map_err(|raw| FetchError::classify(&raw))
    }
}

fn page(body: &str) -> FetchedPage {
    FetchedPage {
        final_url: "http://abc.onion".to_string(),
        status: 200,
        body: body.to_string(),
        body_error: None,
    }
}

fn request() -> FetchRequest<'static> {
    FetchRequest {
        url: "http://abc.onion",
        user_agent: "test-agent",
        proxy: "socks5://127.0.0.1:9050",
        timeout: Duration::from_secs(15),
    }
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_with_delay() {
    let transport = ScriptedTransport::new(vec![
        Err("unexpected EOF".to_string()),
        Err("connection reset by peer".to_string()),
        Ok(page("<html></html>")),
    ]);

    let started = tokio::time::Instant::now();
    let fetched = fetch_with_retry(&transport, &request(), RetryPolicy::default())
        .await
        .expect("third attempt succeeds");

    assert_eq!(fetched.body, "<html></html>");
    assert_eq!(transport.calls(), 3);
    // Two sleeps of two seconds each.
    assert!(started.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_dns_failure_is_terminal() {
    let transport = ScriptedTransport::new(vec![
        Err("dial tcp: lookup abc.onion: no such host".to_string()),
        Ok(page("never reached")),
    ]);

    let started = tokio::time::Instant::now();
    let err = fetch_with_retry(&transport, &request(), RetryPolicy::default())
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 1);
    assert!(err.to_string().contains("no such host"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_classified_terminal_errors_keep_raw_text() {
    for (raw, kind) in [
        ("operation timed out", FailureKind::Timeout),
        ("socks connect error: Host unreachable", FailureKind::Unreachable),
        ("socks connect error: unknown code: 246", FailureKind::InvalidAddress),
        ("tcp connect error: Connection refused", FailureKind::ConnectionRefused),
    ] {
        let transport = ScriptedTransport::new(vec![Err(raw.to_string())]);
        let err = fetch_with_retry(&transport, &request(), RetryPolicy::default())
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1, "{raw}");
        assert_eq!(err.kind(), Some(kind));
        assert_eq!(err.to_string(), kind.message());
        assert_eq!(err.raw(), raw);
    }
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_wraps_last_error() {
    let transport = ScriptedTransport::new(vec![
        Err("unexpected EOF".to_string()),
        Err("unexpected EOF".to_string()),
        Err("tls handshake eof".to_string()),
    ]);

    let err = fetch_with_retry(&transport, &request(), RetryPolicy::default())
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 3);
    match &err {
        FetchError::MaxRetries { attempts, last } => {
            assert_eq!(*attempts, 3);
            assert_eq!(last.raw(), "tls handshake eof");
        }
        other => panic!("expected MaxRetries, got {other:?}"),
    }
    assert!(err.to_string().contains("Maximum number of attempts (3)"));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_budget_follows_policy() {
    let transport = ScriptedTransport::new(vec![
        Err("unexpected EOF".to_string()),
        Err("unexpected EOF".to_string()),
    ]);
    let policy = RetryPolicy {
        max_attempts: 1,
        delay: Duration::from_secs(2),
    };

    let err = fetch_with_retry(&transport, &request(), policy)
        .await
        .unwrap_err();

    assert_eq!(transport.calls(), 1);
    assert!(matches!(err, FetchError::MaxRetries { attempts: 1, .. }));
}

#[tokio::test]
async fn test_url_text_does_not_affect_classification() {
    // Grab a free port and close it again.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let url = format!("http://127.0.0.1:{port}/timeout-eof/thread");
    let request = FetchRequest {
        url: &url,
        user_agent: "test-agent",
        proxy: "",
        timeout: Duration::from_secs(5),
    };

    let err = ReqwestTransport.fetch(&request).await.unwrap_err();

    assert_eq!(err.kind(), Some(FailureKind::ConnectionRefused), "{}", err.raw());
    assert!(!err.raw().contains("timeout-eof"));
}
