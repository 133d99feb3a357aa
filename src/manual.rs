//! On-demand scan of a single address.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::activity::ActivityLog;
use crate::config::Config;
use crate::constants::SOURCE_SCANNER;
use crate::db::{get_keywords, get_user_agents, Database, ScanSource};
use crate::persist::{PersistJob, PersistSender};
use crate::scanner::{resolve_proxy, ScanError, ScanTarget, Scanner, ScrapeResult};

#[derive(Debug, Clone)]
pub struct ManualScanRequest {
    pub url: String,
    /// Pick the user agent from the stored pool instead of the default.
    pub random_ua: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManualScanOutcome {
    pub result: ScrapeResult,
    /// Whether the result was queued for storage.
    pub saved: bool,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// Everything a manual scan needs.
pub struct ManualScanner<'a> {
    pub config: &'a Config,
    pub db: &'a Database,
    pub scanner: &'a Scanner,
    pub activity: &'a dyn ActivityLog,
    pub persist: &'a PersistSender,
}

impl ManualScanner<'_> {
    /// Scan one address. Forum results are queued for storage; everything
    /// else is only reported.
    ///
    /// An in-page error is returned as `Ok` with `result.error_message` set.
    ///
    /// # Errors
    ///
    /// Returns an error when no proxy is available, when the fetch fails, or
    /// when settings cannot be loaded.
    pub async fn run(&self, request: &ManualScanRequest) -> Result<ManualScanOutcome> {
        let target = ScanTarget::new(&request.url, self.config.tor_proxy.clone());
        let url = target.url;
        if url.is_empty() {
            return Err(ScanError::EmptyAddress.into());
        }

        let started = Instant::now();
        self.activity
            .info(SOURCE_SCANNER, &format!("Scan started: {url}"));

        let proxy = match resolve_proxy(
            target.proxy_override.as_deref(),
            self.config.proxy_probe_timeout,
        )
        .await
        {
            Ok(proxy) => proxy,
            Err(e) => {
                self.activity.error(SOURCE_SCANNER, "No active Tor proxy found.");
                return Err(ScanError::from(e).into());
            }
        };
        self.activity
            .info(SOURCE_SCANNER, &format!("Proxy connection established: {proxy}"));

        let keywords = get_keywords(self.db.pool())
            .await
            .context("Failed to load keywords")?;
        let user_agents = if request.random_ua {
            get_user_agents(self.db.pool())
                .await
                .context("Failed to load user agents")?
        } else {
            Vec::new()
        };

        let result = match self
            .scanner
            .analyze_site(&url, &proxy, &keywords, &user_agents)
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_proxy_connection_error() => {
                self.activity
                    .error(SOURCE_SCANNER, "Could not connect to the Tor network.");
                return Err(anyhow::Error::new(e).context(
                    "Could not connect to the Tor network. Make sure Tor is running",
                ));
            }
            Err(e) => {
                self.activity
                    .error(SOURCE_SCANNER, &format!("Site scan error: {e}"));
                return Err(anyhow::Error::new(e).context("Site could not be scanned"));
            }
        };

        if result.has_error() {
            self.activity.error(
                SOURCE_SCANNER,
                &format!("Access error: {}", result.error_message),
            );
            return Ok(ManualScanOutcome {
                result,
                saved: false,
                duration: started.elapsed(),
            });
        }

        if !result.is_forum {
            let duration = started.elapsed();
            self.activity.warn(
                SOURCE_SCANNER,
                &format!(
                    "Target does not look like a forum: {} ({:.2}s)",
                    result.url,
                    duration.as_secs_f64()
                ),
            );
            return Ok(ManualScanOutcome {
                result,
                saved: false,
                duration,
            });
        }

        let duration = started.elapsed();
        self.persist
            .send(PersistJob {
                result: result.clone(),
                source: ScanSource::Manual,
            })
            .await
            .context("Persist queue closed")?;

        self.activity.success(
            SOURCE_SCANNER,
            &format!(
                "Scan complete: {} ({:.2}s)",
                result.url,
                duration.as_secs_f64()
            ),
        );

        Ok(ManualScanOutcome {
            result,
            saved: true,
            duration,
        })
    }
}
