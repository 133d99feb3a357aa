//! Single-page fetch through a SOCKS5 proxy with bounded retries.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Coarse reasons a transport failure is reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidAddress,
    Timeout,
    Unreachable,
    ConnectionRefused,
    CircuitClosed,
}

impl FailureKind {
    /// User-facing explanation.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidAddress => "The onion address is invalid or in an unsupported format (v2).",
            Self::Timeout => "The connection timed out. The site is very slow or offline.",
            Self::Unreachable => "The target host is unreachable.",
            Self::ConnectionRefused => {
                "The connection was refused. The Tor proxy may not be running."
            }
            Self::CircuitClosed => {
                "The server closed the connection (empty response). The site is offline or the Tor circuit dropped."
            }
        }
    }

    /// Terminal failures are not worth another attempt.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::CircuitClosed)
    }
}

/// Known error signatures, matched case-insensitively in order.
const ERROR_SIGNATURES: &[(&str, FailureKind)] = &[
    ("unknown code: 246", FailureKind::InvalidAddress),
    ("0xf6", FailureKind::InvalidAddress),
    ("timeout", FailureKind::Timeout),
    ("timed out", FailureKind::Timeout),
    ("host unreachable", FailureKind::Unreachable),
    ("connection refused", FailureKind::ConnectionRefused),
    ("eof", FailureKind::CircuitClosed),
    ("connection closed before message completed", FailureKind::CircuitClosed),
];

/// Name-resolution failures: terminal but reported verbatim.
const DNS_SIGNATURES: &[&str] = &["no such host", "dns error", "failed to lookup address"];

/// Signs that the local proxy itself could not be reached.
const PROXY_CONNECT_SIGNATURES: &[&str] = &[
    "connection refused",
    "proxyconnect tcp",
    "socks connect",
    "dial tcp 127.0.0.1",
];

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("{message}")]
    Classified {
        kind: FailureKind,
        message: String,
        raw: String,
    },
    #[error("{0}")]
    Unrecognized(String),
    #[error("Maximum number of attempts ({attempts}) reached. Last error: {last}")]
    MaxRetries {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
    #[error("failed to configure HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Classify a raw transport error message.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        ERROR_SIGNATURES
            .iter()
            .find(|(signature, _)| lower.contains(signature))
            .map_or_else(
                || Self::Unrecognized(raw.to_string()),
                |(_, kind)| Self::Classified {
                    kind: *kind,
                    message: kind.message().to_string(),
                    raw: raw.to_string(),
                },
            )
    }

    #[must_use]
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Classified { kind, .. } => Some(*kind),
            Self::MaxRetries { last, .. } => last.kind(),
            Self::Unrecognized(_) | Self::Client(_) => None,
        }
    }

    /// Whether another attempt is pointless.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Classified { kind, .. } => kind.is_terminal(),
            Self::Unrecognized(raw) => {
                let lower = raw.to_lowercase();
                DNS_SIGNATURES.iter().any(|s| lower.contains(s))
            }
            Self::MaxRetries { .. } | Self::Client(_) => true,
        }
    }

    /// The underlying error text, before any rewriting.
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::Classified { raw, .. } | Self::Unrecognized(raw) | Self::Client(raw) => raw,
            Self::MaxRetries { last, .. } => last.raw(),
        }
    }

    /// True when the failure means the local Tor proxy was not reachable.
    #[must_use]
    pub fn is_proxy_connection_error(&self) -> bool {
        let lower = self.raw().to_lowercase();
        PROXY_CONNECT_SIGNATURES.iter().any(|s| lower.contains(s))
    }
}

/// One fetch.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub user_agent: &'a str,
    /// SOCKS5 proxy address; empty for a direct connection.
    pub proxy: &'a str,
    pub timeout: Duration,
}

/// A response whose headers arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    pub final_url: String,
    pub status: u16,
    pub body: String,
    /// Set when the body could not be read after the headers arrived.
    pub body_error: Option<String>,
}

impl FetchedPage {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single HTTP GET.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when no response headers were received.
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<FetchedPage, FetchError>;
}

/// `reqwest`-backed transport. A client is built per request since the user
/// agent and proxy vary between scans.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransport;

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<FetchedPage, FetchError> {
        let mut builder = reqwest::Client::builder()
            .timeout(request.timeout)
            .user_agent(request.user_agent);

        builder = if request.proxy.is_empty() {
            builder.no_proxy()
        } else {
            let proxy = reqwest::Proxy::all(remote_dns(request.proxy))
                .map_err(|e| FetchError::Client(reqwest_chain(e)))?;
            builder.proxy(proxy)
        };

        let client = builder
            .build()
            .map_err(|e| FetchError::Client(reqwest_chain(e)))?;

        let response = client
            .get(request.url)
            .send()
            .await
            .map_err(|e| FetchError::classify(&reqwest_chain(e)))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let (body, body_error) = match response.text().await {
            Ok(body) => (body, None),
            Err(e) => (String::new(), Some(reqwest_chain(e))),
        };

        Ok(FetchedPage {
            final_url,
            status,
            body,
            body_error,
        })
    }
}

/// Resolve names through the proxy so `.onion` hosts work.
fn remote_dns(proxy: &str) -> String {
    proxy.strip_prefix("socks5://").map_or_else(
        || proxy.to_string(),
        |rest| format!("socks5h://{rest}"),
    )
}

/// The error chain without the request URL, which would otherwise be
/// matched against the signature table.
fn reqwest_chain(err: reqwest::Error) -> String {
    error_chain(&err.without_url())
}

/// Display an error together with all of its sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// How many times to try a fetch and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Fetch with retries. Terminal failures return immediately; anything else
/// is retried after `policy.delay` until the attempts run out.
///
/// # Errors
///
/// Returns the terminal error, or [`FetchError::MaxRetries`] wrapping the
/// last error once every attempt failed.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    request: &FetchRequest<'_>,
    policy: RetryPolicy,
) -> Result<FetchedPage, FetchError> {
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            info!(
                url = %request.url,
                attempt,
                max_attempts = policy.max_attempts,
                "Retrying fetch"
            );
            tokio::time::sleep(policy.delay).await;
        } else {
            info!(url = %request.url, "Starting fetch");
        }

        match transport.fetch(request).await {
            Ok(page) => {
                debug!(url = %request.url, status = page.status, attempt, "Fetch completed");
                return Ok(page);
            }
            Err(e) if e.is_terminal() => {
                warn!(url = %request.url, raw = %e.raw(), "Terminal fetch error: {e}");
                return Err(e);
            }
            Err(e) => {
                warn!(url = %request.url, attempt, "Fetch failed, will retry: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(FetchError::MaxRetries {
        attempts: policy.max_attempts,
        last: Box::new(
            last_error.unwrap_or_else(|| FetchError::Unrecognized("no attempt was made".into())),
        ),
    })
}
