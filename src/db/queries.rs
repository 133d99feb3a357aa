use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};

use super::models::{
    format_timestamp, KeywordRow, NewWatchlistEntry, Post, ScanSource, ScanStats, Site,
    SystemLog, Thread, WatchlistEntry,
};
use crate::scanner::{Keyword, ScrapeResult};

/// `now + interval_minutes`, formatted for storage.
fn next_check_after(now: DateTime<Utc>, interval_minutes: i64) -> String {
    format_timestamp(now + Duration::minutes(interval_minutes))
}

fn to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

// ========== Scan Results ==========

/// Store a scan result: site upsert, snapshot row, threads and posts in one
/// transaction. Returns the snapshot ID.
pub async fn save_scan_result(
    pool: &SqlitePool,
    result: &ScrapeResult,
    source: ScanSource,
) -> Result<i64> {
    let scan_date = format_timestamp(Utc::now());
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let site_id: i64 = sqlx::query(
        r"
        INSERT INTO sites (url, is_forum, last_scan)
        VALUES (?, ?, ?)
        ON CONFLICT(url) DO UPDATE SET
            is_forum = excluded.is_forum,
            last_scan = excluded.last_scan
        RETURNING id
        ",
    )
    .bind(&result.url)
    .bind(result.is_forum)
    .bind(&scan_date)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to upsert site")?
    .get("id");

    let stats_id = sqlx::query(
        r"
        INSERT INTO scan_stats (site_id, source, title, total_threads, total_posts, user_agent, scan_date)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(site_id)
    .bind(source.as_str())
    .bind(&result.title)
    .bind(to_i64(result.thread_count))
    .bind(to_i64(result.post_count))
    .bind(&result.user_agent)
    .bind(&scan_date)
    .execute(&mut *tx)
    .await
    .context("Failed to insert scan stats")?
    .last_insert_rowid();

    for thread in &result.threads {
        let thread_id = sqlx::query(
            r"
            INSERT INTO threads (site_id, stats_id, title, link, author, date, content, category)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(site_id)
        .bind(stats_id)
        .bind(&thread.title)
        .bind(&thread.link)
        .bind(&thread.author)
        .bind(&thread.date)
        .bind(&thread.content)
        .bind(&thread.category)
        .execute(&mut *tx)
        .await
        .context("Failed to insert thread")?
        .last_insert_rowid();

        for post in &thread.posts {
            sqlx::query(
                r"
                INSERT INTO posts (thread_id, author, content, date, reactions, last_edited, post_order)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(thread_id)
            .bind(&post.author)
            .bind(&post.content)
            .bind(&post.date)
            .bind(&post.reactions)
            .bind(&post.last_edited)
            .bind(to_i64(post.order))
            .execute(&mut *tx)
            .await
            .context("Failed to insert post")?;
        }
    }

    tx.commit().await.context("Failed to commit scan result")?;
    Ok(stats_id)
}

pub async fn get_site_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Site>> {
    sqlx::query_as("SELECT * FROM sites WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch site by url")
}

/// Snapshots for a site, newest first.
pub async fn get_scan_stats_for_site(pool: &SqlitePool, site_id: i64) -> Result<Vec<ScanStats>> {
    sqlx::query_as("SELECT * FROM scan_stats WHERE site_id = ? ORDER BY id DESC")
        .bind(site_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch scan stats")
}

pub async fn get_threads_for_stats(pool: &SqlitePool, stats_id: i64) -> Result<Vec<Thread>> {
    sqlx::query_as("SELECT * FROM threads WHERE stats_id = ? ORDER BY id")
        .bind(stats_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch threads")
}

/// Posts of a thread in their original page order.
pub async fn get_posts_for_thread(pool: &SqlitePool, thread_id: i64) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE thread_id = ? ORDER BY post_order")
        .bind(thread_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch posts")
}

// ========== Keywords ==========

pub async fn insert_keyword(
    pool: &SqlitePool,
    word: &str,
    category: &str,
    color: &str,
) -> Result<i64> {
    let result = sqlx::query("INSERT INTO keywords (word, category, color) VALUES (?, ?, ?)")
        .bind(word)
        .bind(category)
        .bind(color)
        .execute(pool)
        .await
        .context("Failed to insert keyword")?;

    Ok(result.last_insert_rowid())
}

/// All keywords in insertion order. Tagging is first-match, so order matters.
pub async fn get_keywords(pool: &SqlitePool) -> Result<Vec<Keyword>> {
    let rows: Vec<KeywordRow> = sqlx::query_as("SELECT * FROM keywords ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to fetch keywords")?;

    Ok(rows.into_iter().map(Keyword::from).collect())
}

// ========== User Agents ==========

/// Add a user agent to the pool. Duplicates are ignored.
pub async fn insert_user_agent(pool: &SqlitePool, user_agent: &str) -> Result<()> {
    sqlx::query("INSERT INTO user_agents (user_agent) VALUES (?) ON CONFLICT(user_agent) DO NOTHING")
        .bind(user_agent)
        .execute(pool)
        .await
        .context("Failed to insert user agent")?;

    Ok(())
}

pub async fn get_user_agents(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT user_agent FROM user_agents ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to fetch user agents")?;

    Ok(rows.into_iter().map(|(ua,)| ua).collect())
}

// ========== Watchlist ==========

/// Create an entry whose first check is one interval from now.
pub async fn insert_watchlist_entry(pool: &SqlitePool, entry: &NewWatchlistEntry) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO watchlist (url, interval_minutes, description, next_check)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(&entry.url)
    .bind(entry.interval_minutes)
    .bind(&entry.description)
    .bind(next_check_after(Utc::now(), entry.interval_minutes))
    .execute(pool)
    .await
    .context("Failed to insert watchlist entry")?;

    Ok(result.last_insert_rowid())
}

pub async fn get_watchlist_entry(pool: &SqlitePool, id: i64) -> Result<Option<WatchlistEntry>> {
    sqlx::query_as("SELECT * FROM watchlist WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch watchlist entry")
}

pub async fn list_watchlist(pool: &SqlitePool) -> Result<Vec<WatchlistEntry>> {
    sqlx::query_as("SELECT * FROM watchlist ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list watchlist")
}

/// Active entries never scheduled or scheduled at or before `now`.
pub async fn get_due_watchlist_entries(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<WatchlistEntry>> {
    sqlx::query_as(
        r"
        SELECT * FROM watchlist
        WHERE is_active = 1 AND (next_check IS NULL OR next_check <= ?)
        ORDER BY id
        ",
    )
    .bind(format_timestamp(now))
    .fetch_all(pool)
    .await
    .context("Failed to fetch due watchlist entries")
}

/// Push the next run one interval past `now`.
pub async fn reschedule_watchlist_entry(
    pool: &SqlitePool,
    id: i64,
    interval_minutes: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE watchlist SET next_check = ? WHERE id = ?")
        .bind(next_check_after(now, interval_minutes))
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to reschedule watchlist entry")?;

    Ok(())
}

pub async fn mark_watchlist_checked(
    pool: &SqlitePool,
    id: i64,
    checked_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE watchlist SET last_checked = ? WHERE id = ?")
        .bind(format_timestamp(checked_at))
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark watchlist entry checked")?;

    Ok(())
}

/// Change URL, interval and description. The next check is recomputed from
/// the new interval.
pub async fn update_watchlist_entry(
    pool: &SqlitePool,
    id: i64,
    entry: &NewWatchlistEntry,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE watchlist
        SET url = ?, interval_minutes = ?, description = ?, next_check = ?
        WHERE id = ?
        ",
    )
    .bind(&entry.url)
    .bind(entry.interval_minutes)
    .bind(&entry.description)
    .bind(next_check_after(Utc::now(), entry.interval_minutes))
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update watchlist entry")?;

    Ok(())
}

/// Returns false when no entry has this ID.
pub async fn set_watchlist_active(pool: &SqlitePool, id: i64, is_active: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE watchlist SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to toggle watchlist entry")?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_all_watchlist_active(pool: &SqlitePool, is_active: bool) -> Result<u64> {
    let result = sqlx::query("UPDATE watchlist SET is_active = ?")
        .bind(is_active)
        .execute(pool)
        .await
        .context("Failed to toggle watchlist")?;

    Ok(result.rows_affected())
}

pub async fn delete_watchlist_entry(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM watchlist WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete watchlist entry")?;

    Ok(result.rows_affected() > 0)
}

// ========== System Logs ==========

pub async fn insert_system_log(
    pool: &SqlitePool,
    level: &str,
    source: &str,
    message: &str,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO system_logs (level, source, message, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(level)
    .bind(source)
    .bind(message)
    .bind(format_timestamp(Utc::now()))
    .execute(pool)
    .await
    .context("Failed to insert system log")?;

    Ok(result.last_insert_rowid())
}

/// Most recent log lines, newest first.
pub async fn get_recent_system_logs(pool: &SqlitePool, limit: i64) -> Result<Vec<SystemLog>> {
    sqlx::query_as("SELECT * FROM system_logs ORDER BY id DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to fetch system logs")
}
