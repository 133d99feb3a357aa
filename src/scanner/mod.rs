//! Site analysis: fetch one page through Tor, decide whether it is a forum,
//! and extract its threads and posts.

mod category;
mod classify;
mod clean;
mod dom;
mod extract;
mod fetch;
mod normalize;
mod proxy;
mod types;

pub use category::detect_category;
pub use classify::{
    classify_page, detection_score, resolve_title, Classification, DEFAULT_FORUM_THRESHOLD,
};
pub use clean::clean_text;
pub use extract::{extract_content, find_posts, ExtractContext, Extraction};
pub use fetch::{
    fetch_with_retry, FailureKind, FetchError, FetchRequest, FetchedPage, ReqwestTransport,
    RetryPolicy, Transport,
};
pub use normalize::normalize_url;
pub use proxy::{locate_proxy, locate_proxy_on, resolve_proxy, ProxyError, PROBE_TIMEOUT};
pub use types::{Keyword, PostRecord, ScanTarget, ScrapeResult, ThreadRecord};

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use rand::seq::SliceRandom;
use scraper::Html;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::constants::DEFAULT_USER_AGENT;

#[derive(Debug, Clone, Error)]
pub enum ScanError {
    #[error("no address given")]
    EmptyAddress,
    #[error(transparent)]
    NoProxy(#[from] ProxyError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ScanError {
    /// True when the local Tor proxy could not be found or reached.
    #[must_use]
    pub fn is_proxy_connection_error(&self) -> bool {
        match self {
            Self::NoProxy(_) => true,
            Self::Fetch(e) => e.is_proxy_connection_error(),
            Self::EmptyAddress => false,
        }
    }
}

/// Fetches and analyzes pages.
#[derive(Clone)]
pub struct Scanner {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    request_timeout: Duration,
    forum_threshold: u32,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("forum_threshold", &self.forum_threshold)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Scanner using the real HTTP transport.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_transport(Arc::new(ReqwestTransport), config)
    }

    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            transport,
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                delay: config.retry_delay,
            },
            request_timeout: config.request_timeout,
            forum_threshold: config.forum_score_threshold,
        }
    }

    /// Fetch `target_url` through `proxy` and analyze it.
    ///
    /// A page that was fetched but is unusable (HTTP error status, body cut
    /// off) is returned as `Ok` with [`ScrapeResult::error_message`] set.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty address or when the fetch itself fails.
    pub async fn analyze_site(
        &self,
        target_url: &str,
        proxy: &str,
        keywords: &[Keyword],
        user_agents: &[String],
    ) -> Result<ScrapeResult, ScanError> {
        if target_url.trim().is_empty() {
            return Err(ScanError::EmptyAddress);
        }

        let user_agent = pick_user_agent(user_agents);
        let request = FetchRequest {
            url: target_url,
            user_agent: &user_agent,
            proxy,
            timeout: self.request_timeout,
        };

        let page = fetch_with_retry(self.transport.as_ref(), &request, self.retry).await?;

        let mut result = if let Some(in_page) = in_page_error(&page) {
            info!(url = %target_url, error = %in_page, "Page fetched but unusable");
            ScrapeResult {
                url: target_url.to_string(),
                error_message: in_page,
                ..ScrapeResult::default()
            }
        } else {
            analyze_page(
                &page.body,
                target_url,
                &page.final_url,
                keywords,
                self.forum_threshold,
                Local::now().naive_local(),
            )
        };
        result.user_agent = user_agent;

        Ok(result)
    }
}

/// Classify and extract an already-fetched page.
///
/// `page_url` is recorded in the result and used for thread links;
/// `final_url` is where the page was actually served from after redirects.
#[must_use]
pub fn analyze_page(
    html: &str,
    page_url: &str,
    final_url: &str,
    keywords: &[Keyword],
    forum_threshold: u32,
    now: NaiveDateTime,
) -> ScrapeResult {
    let document = Html::parse_document(html);
    let classification = classify_page(&document, final_url, forum_threshold);
    debug!(
        url = %page_url,
        score = classification.score,
        is_forum = classification.is_forum,
        "Page classified"
    );

    let extraction = extract_content(
        &document,
        &ExtractContext {
            page_url,
            title: &classification.title,
            is_forum: classification.is_forum,
            keywords,
            now,
        },
    );

    ScrapeResult {
        url: page_url.to_string(),
        title: classification.title,
        is_forum: extraction.is_forum,
        thread_count: extraction.thread_count,
        post_count: extraction.post_count,
        error_message: String::new(),
        threads: extraction.threads,
        user_agent: String::new(),
    }
}

fn pick_user_agent(pool: &[String]) -> String {
    match pool.choose(&mut rand::thread_rng()) {
        Some(ua) => {
            debug!(user_agent = %ua, "Random user agent selected");
            ua.clone()
        }
        None => DEFAULT_USER_AGENT.to_string(),
    }
}

fn in_page_error(page: &FetchedPage) -> Option<String> {
    if let Some(raw) = &page.body_error {
        return Some(FetchError::classify(raw).to_string());
    }
    if !page.is_success() {
        return Some(format!("The site responded with HTTP status {}", page.status));
    }
    None
}
