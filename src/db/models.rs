use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DB_TIMESTAMP_FORMAT;
use crate::scanner::Keyword;

/// A scanned site. One row per distinct URL.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub is_forum: bool,
    pub last_scan: Option<String>,
    pub created_at: String,
}

/// Where a scan was triggered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    Manual,
    Watchlist,
}

impl ScanSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Watchlist => "watchlist",
        }
    }
}

/// Immutable snapshot of one scan.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScanStats {
    pub id: i64,
    pub site_id: i64,
    pub source: String,
    pub title: String,
    pub total_threads: i64,
    pub total_posts: i64,
    pub user_agent: String,
    pub scan_date: String,
}

/// A stored thread.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Thread {
    pub id: i64,
    pub site_id: i64,
    pub stats_id: i64,
    pub title: String,
    pub link: String,
    pub author: String,
    pub date: String,
    pub content: String,
    pub category: String,
    pub created_at: String,
}

/// A stored post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    pub author: String,
    pub content: String,
    pub date: String,
    pub reactions: Option<String>,
    pub last_edited: Option<String>,
    pub post_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct KeywordRow {
    pub id: i64,
    pub word: String,
    pub category: String,
    pub color: String,
    pub created_at: String,
}

impl From<KeywordRow> for Keyword {
    fn from(row: KeywordRow) -> Self {
        Self {
            word: row.word,
            category: row.category,
            color: row.color,
        }
    }
}

/// A tracked URL with its own rescan cadence.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WatchlistEntry {
    pub id: i64,
    pub url: String,
    pub interval_minutes: i64,
    pub description: Option<String>,
    pub last_checked: Option<String>,
    pub next_check: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl WatchlistEntry {
    #[must_use]
    pub fn next_check_at(&self) -> Option<DateTime<Utc>> {
        self.next_check.as_deref().and_then(parse_timestamp)
    }

    #[must_use]
    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.last_checked.as_deref().and_then(parse_timestamp)
    }

    /// Active and either never scheduled or scheduled at or before `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.next_check_at().is_none_or(|at| at <= now)
    }
}

/// Input for creating a watchlist entry.
#[derive(Debug, Clone)]
pub struct NewWatchlistEntry {
    pub url: String,
    pub interval_minutes: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemLog {
    pub id: i64,
    pub level: String,
    pub source: String,
    pub message: String,
    pub created_at: String,
}

/// Format a UTC instant the way the database stores it.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(DB_TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp back into UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, DB_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
