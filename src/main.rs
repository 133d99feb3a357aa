use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use onion_forum_scanner::activity::{db_activity_log, ActivityLog};
use onion_forum_scanner::cli::{AgentAction, Cli, Command, KeywordAction, WatchAction};
use onion_forum_scanner::clock::ProcessClock;
use onion_forum_scanner::config::Config;
use onion_forum_scanner::constants::SHUTDOWN_GRACE;
use onion_forum_scanner::db::{
    insert_keyword, insert_user_agent, insert_watchlist_entry, list_watchlist,
    set_watchlist_active, Database, NewWatchlistEntry,
};
use onion_forum_scanner::manual::{ManualScanRequest, ManualScanner};
use onion_forum_scanner::persist::{persist_channel, PersistWorker};
use onion_forum_scanner::scanner::{normalize_url, Scanner};
use onion_forum_scanner::watchlist::WatchlistScheduler;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::from_env();

    init_tracing(config.as_ref().is_ok_and(|c| c.json_logs))?;

    let config = config.context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let clock = ProcessClock::start();

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    match cli.command() {
        Command::Run => serve(config, db, clock).await,
        Command::Scan { url, random_ua } => scan_once(&config, db, url, random_ua).await,
        Command::Watch { action } => watch(&db, action).await,
        Command::Keyword {
            action: KeywordAction::Add {
                word,
                category,
                color,
            },
        } => {
            let id = insert_keyword(db.pool(), &word, &category, &color).await?;
            println!("Keyword {id} added: {word} -> {category}");
            Ok(())
        }
        Command::Agent {
            action: AgentAction::Add { user_agent },
        } => {
            insert_user_agent(db.pool(), &user_agent).await?;
            println!("User agent added");
            Ok(())
        }
    }
}

async fn serve(config: Config, db: Database, clock: ProcessClock) -> Result<()> {
    info!(
        started_at = %clock.started_at(),
        tor_proxy = config.tor_proxy.as_deref().unwrap_or("auto"),
        "Starting onion-forum-scanner"
    );

    let (persist_tx, persist_rx) = persist_channel();
    let worker_handle = tokio::spawn(PersistWorker::new(db.clone(), persist_rx).run());
    let (activity, writer) = db_activity_log(db.clone());
    let writer_handle = tokio::spawn(writer.run());

    let scanner = Arc::new(Scanner::new(&config));
    let activity: Arc<dyn ActivityLog> = Arc::new(activity);
    let scheduler =
        WatchlistScheduler::new(&config, db, scanner, activity, persist_tx, clock);

    let shutdown = CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone(), SHUTDOWN_GRACE));

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down...");
    shutdown.cancel();

    if let Err(e) = scheduler_handle.await {
        error!("Watchlist scheduler task failed: {e}");
    }
    // With the scheduler gone the queues close once their last senders drop.
    finish("Persist worker", worker_handle).await;
    finish("Activity writer", writer_handle).await;

    info!(uptime_secs = clock.uptime().as_secs(), "Shutdown complete");
    Ok(())
}

async fn scan_once(config: &Config, db: Database, url: String, random_ua: bool) -> Result<()> {
    let (persist_tx, persist_rx) = persist_channel();
    let worker_handle = tokio::spawn(PersistWorker::new(db.clone(), persist_rx).run());
    let (activity, writer) = db_activity_log(db.clone());
    let writer_handle = tokio::spawn(writer.run());

    let scanner = Scanner::new(config);
    let outcome = ManualScanner {
        config,
        db: &db,
        scanner: &scanner,
        activity: &activity,
        persist: &persist_tx,
    }
    .run(&ManualScanRequest { url, random_ua })
    .await;

    drop(persist_tx);
    drop(activity);
    finish("Persist worker", worker_handle).await;
    finish("Activity writer", writer_handle).await;

    let outcome = outcome?;
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to encode scan result")?
    );
    Ok(())
}

/// Wait up to [`SHUTDOWN_GRACE`] for a drain task, aborting it after that.
async fn finish<T>(name: &str, handle: tokio::task::JoinHandle<T>)
where
    T: Send + 'static,
{
    let abort = handle.abort_handle();
    match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => error!("{name} task failed: {e}"),
        Err(_) => {
            warn!("{name} did not finish within {}s, aborting", SHUTDOWN_GRACE.as_secs());
            abort.abort();
        }
    }
}

async fn watch(db: &Database, action: WatchAction) -> Result<()> {
    match action {
        WatchAction::Add {
            url,
            interval,
            description,
        } => {
            let url = normalize_url(&url);
            if url.is_empty() {
                bail!("URL is required");
            }
            let entry = NewWatchlistEntry {
                url,
                interval_minutes: interval,
                description,
            };
            let id = insert_watchlist_entry(db.pool(), &entry).await?;
            println!("Watchlist entry {id} added: {}", entry.url);
        }
        WatchAction::List => {
            for entry in list_watchlist(db.pool()).await? {
                println!(
                    "{}\t{}\t{} min\t{}\tnext: {}\tlast: {}",
                    entry.id,
                    entry.url,
                    entry.interval_minutes,
                    if entry.is_active { "active" } else { "paused" },
                    entry.next_check.as_deref().unwrap_or("-"),
                    entry.last_checked.as_deref().unwrap_or("-"),
                );
            }
        }
        WatchAction::Toggle { id, state } => {
            if !set_watchlist_active(db.pool(), id, state.is_on()).await? {
                bail!("Watchlist entry {id} not found");
            }
            println!(
                "Watchlist entry {id} {}",
                if state.is_on() { "enabled" } else { "disabled" }
            );
        }
    }
    Ok(())
}

fn init_tracing(use_json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,onion_forum_scanner=debug"));

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
