use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use xbskv::config::{Cli, Config, default_config_dir, default_config_path};
use xbskv::db::Database;
use xbskv::handler::AppState;
use xbskv::router;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    // --config puts the database next to the config file, otherwise ~/.xbskv/
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("xbskv.svc starting");

    let cfg = Config::new_or_default(&config_path).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let db = Arc::new(Database::new(&cfg, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();

    if db.replicated() {
        let sync_db = db.clone();
        let sync_token = cancellation_token.clone();
        let period = std::time::Duration::from_secs(cfg.app.sync_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = sync_db.sync().await {
                            tracing::warn!("failed to sync replica: {}", e);
                        }
                    }
                    _ = sync_token.cancelled() => {
                        tracing::info!("replica sync task shutting down");
                        break;
                    }
                }
            }
        });
    }

    tracing::info!(
        create_enabled = cfg.app.create_enabled,
        database = cfg.app.get_db(),
        "configuration loaded"
    );

    let app = router(AppState::new(db.clone(), cfg)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to build router");
        std::process::exit(1);
    });

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
        }
        signal_token.cancel();
    });

    tracing::info!("xbskv.svc running on {}", &address);
    let shutdown_token = cancellation_token.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await;
    if let Err(err) = result {
        tracing::error!(error = %err, "server stopped with error");
        std::process::exit(1);
    }
    cancellation_token.cancel();

    if let Err(e) = db.sync().await {
        tracing::warn!("final replica sync failed: {}", e);
    }
    tracing::info!("xbskv.svc going off, graceful shutdown complete");
}
