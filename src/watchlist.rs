//! Periodic rescans of watchlist entries.
//!
//! Every tick the scheduler loads the entries that are due and runs one
//! independent task per entry. Each task always pushes `next_check` one
//! interval forward, whatever the scan outcome. Entry tasks are tracked so
//! shutdown can wait for in-flight scans to hand over their results.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::activity::ActivityLog;
use crate::clock::ProcessClock;
use crate::config::Config;
use crate::constants::SOURCE_WATCHLIST;
use crate::db::{
    get_due_watchlist_entries, get_keywords, get_user_agents, mark_watchlist_checked,
    reschedule_watchlist_entry, Database, ScanSource, WatchlistEntry,
};
use crate::persist::{PersistJob, PersistSender};
use crate::scanner::{normalize_url, resolve_proxy, Scanner};

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Forum found; result queued for storage.
    Saved,
    NotForum,
    Failed,
}

#[derive(Clone)]
pub struct WatchlistScheduler {
    db: Database,
    scanner: Arc<Scanner>,
    activity: Arc<dyn ActivityLog>,
    persist: PersistSender,
    proxy_override: Option<String>,
    probe_timeout: Duration,
    tick: Duration,
    clock: ProcessClock,
    tasks: TaskTracker,
}

impl WatchlistScheduler {
    #[must_use]
    pub fn new(
        config: &Config,
        db: Database,
        scanner: Arc<Scanner>,
        activity: Arc<dyn ActivityLog>,
        persist: PersistSender,
        clock: ProcessClock,
    ) -> Self {
        Self {
            db,
            scanner,
            activity,
            persist,
            proxy_override: config.tor_proxy.clone(),
            probe_timeout: config.proxy_probe_timeout,
            tick: config.scheduler_tick,
            clock,
            tasks: TaskTracker::new(),
        }
    }

    /// Tick until `shutdown` is cancelled, then wait up to `grace` for
    /// in-flight entry tasks.
    pub async fn run(self, shutdown: CancellationToken, grace: Duration) {
        info!(tick_secs = self.tick.as_secs(), "Watchlist scheduler started");

        let mut interval = tokio::time::interval(self.tick);
        // The first tick fires immediately; wait a full period like a ticker.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!(uptime_secs = self.clock.uptime().as_secs(), "Watchlist tick");
                    if let Err(e) = self.dispatch_due().await {
                        error!("Failed to load due watchlist entries: {e:#}");
                    }
                }
                () = shutdown.cancelled() => {
                    info!("Watchlist scheduler shutting down");
                    break;
                }
            }
        }

        self.drain(grace).await;
    }

    /// Wait up to `grace` for entry tasks already spawned. Returns `false`
    /// if some were still running.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tasks.close();
        let pending = self.tasks.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight watchlist scans");
        }

        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!(
                pending = self.tasks.len(),
                "Watchlist scans still running at shutdown"
            );
            return false;
        }
        true
    }

    /// Spawn one task per due entry and return their handles.
    ///
    /// # Errors
    ///
    /// Returns an error if the due entries cannot be loaded.
    pub async fn dispatch_due(&self) -> Result<Vec<JoinHandle<EntryOutcome>>> {
        let due = get_due_watchlist_entries(self.db.pool(), Utc::now()).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        info!(count = due.len(), "Watchlist entries due for scan");

        Ok(due
            .into_iter()
            .map(|entry| {
                let scheduler = self.clone();
                self.tasks
                    .spawn(async move { scheduler.process_entry(&entry).await })
            })
            .collect())
    }

    /// Scan one entry, then reschedule it.
    pub async fn process_entry(&self, entry: &WatchlistEntry) -> EntryOutcome {
        info!(id = entry.id, url = %entry.url, "Watchlist scan starting");

        let outcome = self.scan_entry(entry).await;

        if let Err(e) =
            reschedule_watchlist_entry(self.db.pool(), entry.id, entry.interval_minutes, Utc::now())
                .await
        {
            error!(id = entry.id, "Failed to reschedule watchlist entry: {e:#}");
        }

        outcome
    }

    async fn scan_entry(&self, entry: &WatchlistEntry) -> EntryOutcome {
        let proxy = match resolve_proxy(self.proxy_override.as_deref(), self.probe_timeout).await
        {
            Ok(proxy) => proxy,
            Err(_) => {
                self.activity.error(
                    SOURCE_WATCHLIST,
                    &format!("Watchlist scan failed (no Tor proxy found): {}", entry.url),
                );
                return EntryOutcome::Failed;
            }
        };

        let keywords = get_keywords(self.db.pool()).await.unwrap_or_else(|e| {
            warn!("Failed to load keywords: {e:#}");
            Vec::new()
        });
        let user_agents = get_user_agents(self.db.pool()).await.unwrap_or_else(|e| {
            warn!("Failed to load user agents: {e:#}");
            Vec::new()
        });

        let url = normalize_url(&entry.url);
        let result = match self
            .scanner
            .analyze_site(&url, &proxy, &keywords, &user_agents)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                self.activity.error(
                    SOURCE_WATCHLIST,
                    &format!("Watchlist scan error: {} - {e}", entry.url),
                );
                return EntryOutcome::Failed;
            }
        };

        if result.has_error() {
            self.activity.error(
                SOURCE_WATCHLIST,
                &format!(
                    "Watchlist access error: {} - {}",
                    entry.url, result.error_message
                ),
            );
            return EntryOutcome::Failed;
        }

        if !result.is_forum {
            self.activity.warn(
                SOURCE_WATCHLIST,
                &format!("Watchlist site is not a forum: {}", entry.url),
            );
            return EntryOutcome::NotForum;
        }

        let (threads, posts) = (result.thread_count, result.post_count);
        let job = PersistJob {
            result,
            source: ScanSource::Watchlist,
        };
        if self.persist.send(job).await.is_err() {
            error!(id = entry.id, "Persist queue closed, result dropped");
            return EntryOutcome::Failed;
        }

        if let Err(e) = mark_watchlist_checked(self.db.pool(), entry.id, Utc::now()).await {
            error!(id = entry.id, "Failed to update last_checked: {e:#}");
        }

        self.activity.success(
            SOURCE_WATCHLIST,
            &format!(
                "Watchlist scan complete: {} ({threads} threads, {posts} posts)",
                entry.url
            ),
        );
        EntryOutcome::Saved
    }
}
