//! Background persistence of scan results.
//!
//! The scan pipeline never touches storage. Callers hand finished results
//! to [`PersistWorker`] through a bounded channel.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::db::{save_scan_result, Database, ScanSource};
use crate::scanner::ScrapeResult;

/// Pending jobs before senders start waiting.
pub const PERSIST_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct PersistJob {
    pub result: ScrapeResult,
    pub source: ScanSource,
}

pub type PersistSender = mpsc::Sender<PersistJob>;
pub type PersistReceiver = mpsc::Receiver<PersistJob>;

#[must_use]
pub fn persist_channel() -> (PersistSender, PersistReceiver) {
    mpsc::channel(PERSIST_QUEUE_CAPACITY)
}

/// Drains the persist queue into the database.
pub struct PersistWorker {
    db: Database,
    rx: PersistReceiver,
}

impl PersistWorker {
    #[must_use]
    pub const fn new(db: Database, rx: PersistReceiver) -> Self {
        Self { db, rx }
    }

    /// Run until every sender has been dropped and the queue is empty.
    /// Returns the number of results stored.
    pub async fn run(mut self) -> usize {
        info!("Persist worker started");
        let mut saved = 0;

        while let Some(job) = self.rx.recv().await {
            if self.store(&job).await {
                saved += 1;
            }
        }

        info!(saved, "Persist worker stopped");
        saved
    }

    async fn store(&self, job: &PersistJob) -> bool {
        match save_scan_result(self.db.pool(), &job.result, job.source).await {
            Ok(stats_id) => {
                debug!(
                    url = %job.result.url,
                    source = job.source.as_str(),
                    stats_id,
                    threads = job.result.thread_count,
                    posts = job.result.post_count,
                    "Scan result stored"
                );
                true
            }
            Err(e) => {
                error!(url = %job.result.url, "Failed to store scan result: {e:#}");
                false
            }
        }
    }
}
