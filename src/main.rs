use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{net::TcpListener, signal, time::MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use zymirror::{
    SyncOrchestrator, SyncReport,
    config::{Config, DEFAULT_CONFIG_FILE},
    db::{self, DbActorHandle},
    error::IsRetryable,
    server::{MirrorState, mirror_router},
    sync::{BatchSizes, import_bundle},
    upstream::HttpCatalogSource,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "zymirror", version, about = "Mirror the Zywrap catalog into SQLite")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "ZYMIRROR_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync cycle against the export service.
    Sync,
    /// Apply a local bundle (`.zip` or `zywrap-data.json`) as a full reset.
    Import { path: PathBuf },
    /// Serve the read API, syncing every `sync.interval_secs` when set.
    Serve,
    /// Print the version the mirror currently reflects.
    Version,
    /// Save the full export archive locally for a later `import`.
    Download {
        #[arg(short, long, default_value = "zywrap-data.zip")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.clone())?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        config = %cli.config.display(),
        database_url = %cfg.basic.database_url,
        updates_url = %cfg.upstream.updates_url,
        proxy = %cfg.upstream.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.basic.loglevel,
        upsert_batch_size = cfg.sync.upsert_batch_size,
        delete_batch_size = cfg.sync.delete_batch_size,
        interval_secs = cfg.sync.interval_secs,
    );

    // `download` never opens the database.
    let db = match &cli.command {
        Command::Download { out } => return download(&cfg, out).await,
        _ => db::spawn(&cfg.basic.database_url, BatchSizes::from(cfg.sync)).await?,
    };

    match cli.command {
        Command::Sync => {
            cfg.validate_upstream()?;
            let orchestrator = build_orchestrator(&cfg, db)?;
            let report = orchestrator.run_cycle().await.inspect_err(|e| {
                error!(error = %e, retryable = e.is_retryable(), "sync cycle failed");
            })?;
            print_report(&report)?;
        }
        Command::Import { path } => {
            let report = import_bundle(&db, &path).await.inspect_err(|e| {
                error!(path = %path.display(), error = %e, "import failed");
            })?;
            print_report(&report)?;
        }
        Command::Version => {
            let version = db.current_version().await?;
            println!("{}", version.as_deref().unwrap_or("<none>"));
        }
        Command::Serve => serve(&cfg, db).await?,
        Command::Download { .. } => {}
    }

    Ok(())
}

fn build_orchestrator(
    cfg: &Config,
    db: DbActorHandle,
) -> Result<SyncOrchestrator, Box<dyn std::error::Error>> {
    let source = HttpCatalogSource::new(&cfg.upstream)?;
    Ok(SyncOrchestrator::new(Arc::new(source), db))
}

async fn download(cfg: &Config, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    cfg.validate_upstream()?;
    let source = HttpCatalogSource::new(&cfg.upstream)?;
    let bytes = source.download_export(out).await.inspect_err(|e| {
        error!(out = %out.display(), error = %e, "download failed");
    })?;
    println!("{} ({bytes} bytes)", out.display());
    Ok(())
}

fn print_report(report: &SyncReport) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn serve(cfg: &Config, db: DbActorHandle) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.sync.interval_secs > 0 {
        match cfg.validate_upstream() {
            Ok(()) => {
                let orchestrator = build_orchestrator(cfg, db.clone())?;
                tokio::spawn(periodic_sync(
                    orchestrator,
                    Duration::from_secs(cfg.sync.interval_secs),
                ));
            }
            Err(e) => warn!(error = %e, "periodic sync disabled"),
        }
    }

    let app = mirror_router(MirrorState::new(db));
    let addr = SocketAddr::from((cfg.basic.listen_addr, cfg.basic.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server has shut down gracefully.");
    Ok(())
}

/// Cycles run back to back on this task; a slow cycle delays the next tick.
async fn periodic_sync(orchestrator: SyncOrchestrator, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match orchestrator.run_cycle().await {
            Ok(report) => info!(
                mode = %report.mode,
                version = report.version.as_deref().unwrap_or("<none>"),
                rows_affected = report.rows_affected(),
                "periodic sync finished"
            ),
            Err(e) => error!(
                error = %e,
                retryable = e.is_retryable(),
                "periodic sync failed; mirror left at previous version"
            ),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
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
