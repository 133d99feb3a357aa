//! On-demand scans with a canned transport.

use async_trait::async_trait;
use onion_forum_scanner::activity::{LogLevel, MemoryActivityLog};
use onion_forum_scanner::config::Config;
use onion_forum_scanner::db::{insert_keyword, insert_user_agent, Database, ScanSource};
use onion_forum_scanner::manual::{ManualScanRequest, ManualScanner};
use onion_forum_scanner::persist::persist_channel;
use onion_forum_scanner::scanner::{FetchError, FetchRequest, FetchedPage, Scanner, Transport};
use std::sync::Arc;
use tempfile::TempDir;

const FORUM_PAGE: &str = r#"<html><head><title>Market talk</title>
<meta name="generator" content="MyBB"></head><body>
<div class="post"><span class="username">alice</span><div class="content">Anyone selling a market guide?</div></div>
</body></html>"#;

/// Serves a forum for `forum` hosts, a 503 for `down` hosts and a plain page
/// otherwise.
struct CannedTransport;

#[async_trait]
impl Transport for CannedTransport {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<FetchedPage, FetchError> {
        let (status, body) = if request.url.contains("forum") {
            (200, FORUM_PAGE)
        } else if request.url.contains("down") {
            (503, "")
        } else {
            (200, "<html><head><title>Plain</title></head><body>hi</body></html>")
        };
        Ok(FetchedPage {
            final_url: request.url.to_string(),
            status,
            body: body.to_string(),
            body_error: None,
        })
    }
}

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn config() -> Config {
    Config {
        tor_proxy: Some("socks5://127.0.0.1:9050".to_string()),
        ..Config::for_testing()
    }
}

fn request(url: &str, random_ua: bool) -> ManualScanRequest {
    ManualScanRequest {
        url: url.to_string(),
        random_ua,
    }
}

#[tokio::test]
async fn test_forum_scan_is_queued_for_storage() {
    let (db, _temp_dir) = setup_db().await;
    insert_keyword(db.pool(), "market", "Market", "").await.unwrap();
    insert_user_agent(db.pool(), "pool-agent").await.unwrap();

    let config = config();
    let scanner = Scanner::with_transport(Arc::new(CannedTransport), &config);
    let activity = MemoryActivityLog::new();
    let (tx, mut rx) = persist_channel();

    let outcome = ManualScanner {
        config: &config,
        db: &db,
        scanner: &scanner,
        activity: &activity,
        persist: &tx,
    }
    .run(&request("forumsite", true))
    .await
    .unwrap();

    assert!(outcome.saved);
    assert_eq!(outcome.result.url, "http://forumsite.onion");
    assert_eq!(outcome.result.user_agent, "pool-agent");
    assert_eq!(outcome.result.threads[0].category, "Market");

    let job = rx.try_recv().expect("job queued");
    assert_eq!(job.source, ScanSource::Manual);
    assert_eq!(job.result, outcome.result);

    assert!(activity.has(LogLevel::Info, "Scan started: http://forumsite.onion"));
    assert!(activity.has(LogLevel::Success, "Scan complete"));
}

#[tokio::test]
async fn test_non_forum_is_not_saved() {
    let (db, _temp_dir) = setup_db().await;
    let config = config();
    let scanner = Scanner::with_transport(Arc::new(CannedTransport), &config);
    let activity = MemoryActivityLog::new();
    let (tx, mut rx) = persist_channel();

    let outcome = ManualScanner {
        config: &config,
        db: &db,
        scanner: &scanner,
        activity: &activity,
        persist: &tx,
    }
    .run(&request("plainsite", false))
    .await
    .unwrap();

    assert!(!outcome.saved);
    assert!(!outcome.result.is_forum);
    assert!(rx.try_recv().is_err());
    assert!(activity.has(LogLevel::Warn, "does not look like a forum"));
}

#[tokio::test]
async fn test_in_page_error_is_reported() {
    let (db, _temp_dir) = setup_db().await;
    let config = config();
    let scanner = Scanner::with_transport(Arc::new(CannedTransport), &config);
    let activity = MemoryActivityLog::new();
    let (tx, mut rx) = persist_channel();

    let outcome = ManualScanner {
        config: &config,
        db: &db,
        scanner: &scanner,
        activity: &activity,
        persist: &tx,
    }
    .run(&request("downsite", false))
    .await
    .unwrap();

    assert!(!outcome.saved);
    assert!(outcome.result.error_message.contains("503"));
    assert!(rx.try_recv().is_err());
    assert!(activity.has(LogLevel::Error, "Access error"));
}

#[tokio::test]
async fn test_empty_address_is_an_error() {
    let (db, _temp_dir) = setup_db().await;
    let config = config();
    let scanner = Scanner::with_transport(Arc::new(CannedTransport), &config);
    let activity = MemoryActivityLog::new();
    let (tx, _rx) = persist_channel();

    let result = ManualScanner {
        config: &config,
        db: &db,
        scanner: &scanner,
        activity: &activity,
        persist: &tx,
    }
    .run(&request("  ", false))
    .await;

    assert!(result.is_err());
    assert!(activity.lines().is_empty());
}
