//! Result shapes shared by the scanner, persistence and CLI.

use serde::{Deserialize, Serialize};

/// A keyword that tags extracted text with a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub category: String,
    /// Display color for the category label.
    #[serde(default)]
    pub color: String,
}

impl Keyword {
    #[must_use]
    pub fn new(word: &str, category: &str) -> Self {
        Self {
            word: word.to_string(),
            category: category.to_string(),
            color: String::new(),
        }
    }
}

/// A single page to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    /// Normalized URL.
    pub url: String,
    /// Proxy to use instead of probing for a local Tor proxy.
    pub proxy_override: Option<String>,
}

impl ScanTarget {
    /// Build a target from a raw user-supplied address.
    #[must_use]
    pub fn new(raw_url: &str, proxy_override: Option<String>) -> Self {
        Self {
            url: super::normalize::normalize_url(raw_url),
            proxy_override,
        }
    }
}

/// Outcome of one fetch-and-analyze run against a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub url: String,
    pub title: String,
    pub is_forum: bool,
    pub thread_count: usize,
    pub post_count: usize,
    /// Non-empty when the page was fetched but is unusable.
    pub error_message: String,
    pub threads: Vec<ThreadRecord>,
    pub user_agent: String,
}

impl ScrapeResult {
    /// True when the page was fetched but reported an in-page error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }
}

/// One discussion topic found on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub title: String,
    pub link: String,
    pub author: String,
    pub date: String,
    pub content: String,
    pub category: String,
    pub posts: Vec<PostRecord>,
}

/// One post inside a thread, in DOM order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub author: String,
    pub content: String,
    pub date: String,
    pub reactions: Option<String>,
    pub last_edited: Option<String>,
    /// 1-based position within the thread.
    pub order: usize,
}
