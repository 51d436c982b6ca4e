//! chatd-ng - real-time multi-device chat daemon.
//!
//! One WebSocket stream per connected client platform, routed through a
//! pub/sub broker with durable delivery for the primary platform.

mod broker;
mod config;
mod db;
mod error;
mod handlers;
mod history;
mod http;
mod metrics;
mod network;
mod repo;
mod routing;
mod state;

use crate::broker::{Broker, MemoryBroker};
use crate::config::Config;
use crate::db::Database;
use crate::handlers::AccountService;
use crate::history::HistoryProvider;
use crate::network::Gateway;
use crate::repo::{MemoryRepository, Repository, StoreRepository};
use crate::state::Matrix;
use chat_proto::Topics;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const HISTORY_PRUNE_INTERVAL_SECS: u64 = 86_400;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        service = %config.server.service,
        primary_platform = %config.session.primary_platform,
        "Starting chatd-ng"
    );

    // Initialize history provider
    let history: Arc<dyn HistoryProvider> = if config.history.enabled {
        match config.history.backend.as_str() {
            "redb" => {
                info!(path = %config.history.path, "Initializing Redb history backend");
                Arc::new(crate::history::redb::RedbProvider::new(&config.history.path)?)
            }
            "memory" => {
                info!("Using in-memory history backend");
                Arc::new(crate::history::memory::MemoryHistory::new())
            }
            _ => {
                info!("History backend 'none'. Using NoOp.");
                Arc::new(crate::history::noop::NoOpProvider)
            }
        }
    } else {
        info!("History disabled. Using NoOp provider.");
        Arc::new(crate::history::noop::NoOpProvider)
    };
    let persist = config.history.enabled && config.history.backend != "none";

    // Initialize repository
    let repo: Arc<dyn Repository> = match &config.database {
        Some(database) => {
            let db = Database::new(&database.path).await?;
            info!(path = %database.path, "Database ready");
            Arc::new(StoreRepository::new(db, history.clone()))
        }
        None => {
            info!("No database configured. Using in-memory repository.");
            Arc::new(MemoryRepository::new(history.clone()))
        }
    };

    let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new(
        config.broker.retention,
        config.broker.subscriber_buffer,
    ));
    let topics = Topics::new(config.server.service.clone());

    let matrix = Arc::new(Matrix::new(
        repo,
        broker.clone(),
        topics.clone(),
        config.session.clone(),
        persist,
    ));

    // Apply control-topic kicks to local sessions
    let shutdown = CancellationToken::new();
    matrix
        .hub
        .watch_control(broker, &topics, shutdown.clone())
        .await?;
    info!(topic = %topics.control(), "Control topic watcher started");

    // Admin HTTP server is optional.
    // Convention: metrics_port = 0 disables it.
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Admin HTTP server disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");

        let accounts = Arc::new(AccountService::new(Arc::clone(&matrix)));
        tokio::spawn(async move {
            http::run_http_server(metrics_port, accounts).await;
        });
        info!(port = metrics_port, "Admin HTTP server started");
    }

    // Start message history pruning task (runs at startup + daily)
    if persist {
        let history = Arc::clone(&history);
        let retention = std::time::Duration::from_secs(config.history.retention_days * 86_400);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(HISTORY_PRUNE_INTERVAL_SECS));
            loop {
                // first tick completes immediately
                interval.tick().await;
                match history.prune(retention).await {
                    Ok(removed) if removed > 0 => {
                        info!(removed = removed, "Old events pruned from history");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Failed to prune event history");
                    }
                }
            }
        });
        info!(retention_days = config.history.retention_days, "History pruning task started");
    }

    let gateway = Gateway::bind(&config.listen, config.tls.as_ref(), matrix).await?;

    tokio::select! {
        result = gateway.run() => {
            if let Err(e) = result {
                error!(error = %e, "Gateway stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }
    shutdown.cancel();

    Ok(())
}
