use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edgecrawl::config::{self, AppConfig};
use edgecrawl::db;
use edgecrawl::recovery::{Recovery, SolrIndex};
use edgecrawl::routes;
use edgecrawl::scheduler::{self, Scheduler};
use edgecrawl::state::AppState;
use edgecrawl::store::TreeStore;

#[derive(Parser)]
#[command(name = "edgecrawl", version, about = "Incremental file system and share crawler")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the crawl workers, the scheduler and the admin API (default)
    Serve,
    /// Rebuild the work queue from the authoritative index and exit
    Recover,
    /// Push the configured roots onto the work queue and exit
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging (stdout + daily file rotation under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "edgecrawl.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,edgecrawl=info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard);

    // embedded defaults -> edgecrawl.toml -> EDGECRAWL_CONFIG -> env/.env
    let app_cfg = config::load()?;
    let pool = open_pool(&app_cfg).await?;
    db::init_db(&pool).await?;

    let command = cli.command.unwrap_or(Command::Serve);
    config::ensure_parent_dir(&app_cfg.store.path)?;
    let store = match command {
        // the durable tree may be the corrupt part, do not load it
        Command::Recover => TreeStore::empty_at(app_cfg.store.path.clone()),
        _ => TreeStore::open(app_cfg.store.path.clone()).await?,
    };
    let state = AppState::new(pool, app_cfg.clone(), Arc::new(store))?;

    match command {
        Command::Serve => serve(state, app_cfg).await,
        Command::Recover => recover(state).await,
        Command::Seed => seed(state).await,
    }
}

async fn open_pool(cfg: &AppConfig) -> anyhow::Result<SqlitePool> {
    let db_url = &cfg.database.url;
    config::ensure_sqlite_parent_dir(db_url)?;
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        info!("Creating SQLite database at {}", db_url);
        Sqlite::create_database(db_url).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections((cfg.crawler.worker_count() as u32 + 4).min(32))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                let _ = sqlx::query("PRAGMA temp_store=MEMORY;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect(db_url)
        .await?;
    Ok(pool)
}

async fn serve(state: AppState, cfg: AppConfig) -> anyhow::Result<()> {
    let released = state.queue.requeue_claimed().await?;
    if released > 0 {
        info!(released, "Released tasks claimed by a previous run");
    }

    let cancel = state.shutdown.clone();
    let workers = state.crawler.spawn_workers(cfg.crawler.worker_count(), cancel.clone());
    info!(workers = workers.len(), "Crawl workers started");

    let scheduler = Scheduler::new(
        state.crawler_state.clone(),
        state.queue.clone(),
        Scheduler::parse_roots(&cfg.crawler.roots),
        Duration::from_secs(cfg.crawler.refresh_interval_secs),
    );
    let scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));
    let flusher_task = tokio::spawn(scheduler::run_flusher(
        state.store.clone(),
        Duration::from_secs(cfg.store.flush_interval_secs),
        state.metrics.clone(),
        cancel.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", cfg.server.host, cfg.server.port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("EdgeCrawl admin API listening on http://{}", listener.local_addr()?);

    let halted = state.crawler.clone();
    let app = routes::router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Crawl worker ended abnormally: {}", e);
        }
    }
    let _ = scheduler_task.await;
    if let Err(e) = flusher_task.await {
        error!("Tree flusher ended abnormally: {}", e);
    }

    if halted.is_halted() {
        return Err(anyhow::anyhow!("crawler halted after repeated queue delivery failures"));
    }
    Ok(())
}

async fn recover(state: AppState) -> anyhow::Result<()> {
    let mut source = SolrIndex::new(&state.config.recovery)?;
    let report = Recovery::new(
        state.queue.clone(),
        state.store.clone(),
        state.metrics.clone(),
        state.config.recovery.collection.clone(),
        state.config.recovery.audit_dir.clone(),
    )
    .run(&mut source)
    .await?;
    info!(
        records = report.records,
        enqueued = report.enqueued,
        "Recovery complete; start `edgecrawl serve` to rebuild the tree store"
    );
    Ok(())
}

async fn seed(state: AppState) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(
        state.crawler_state.clone(),
        state.queue.clone(),
        Scheduler::parse_roots(&state.config.crawler.roots),
        Duration::from_secs(state.config.crawler.refresh_interval_secs),
    );
    let outcome = scheduler.seed().await?;
    info!(?outcome, "Seeding finished");
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM, or when the crawler halts itself.
async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = cancel.cancelled() => {},
                }
                info!("Shutdown signal received. Stopping crawler...");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
            _ = cancel.cancelled() => {},
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = cancel.cancelled() => {},
        }
    }
    info!("Shutdown signal received. Stopping crawler...");
}
