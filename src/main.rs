//! ggcache - A TTL key-value cache server
//!
//! Binary entry point: wires configuration, cache, replication and the TCP
//! server together.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ggcache::{
    spawn_cleanup_task, CacheStore, Config, FollowerSet, NoopReplicator, ReplicationOptions,
    Replicator, Server, ServerLimits, ServerRole,
};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the sharded cache store and its TTL cleanup task
/// 4. Start follower links when running as a leader
/// 5. Accept TCP connections until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ggcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        listen_addr = %config.listen_addr,
        role = %config.role,
        followers = config.followers.len(),
        shards = config.shard_count,
        cleanup_interval_ms = config.cleanup_interval_ms,
        "configuration loaded"
    );

    let cache = Arc::new(CacheStore::new(config.shard_count));
    let mut background = vec![spawn_cleanup_task(cache.clone(), config.cleanup_interval())];

    let replicator: Arc<dyn Replicator> = match config.role {
        ServerRole::Leader if !config.followers.is_empty() => {
            let (followers, links) =
                FollowerSet::spawn(&config.followers, ReplicationOptions::from_config(&config));
            background.extend(links);
            info!(followers = followers.len(), "replication links started");
            Arc::new(followers)
        }
        ServerRole::Follower if !config.followers.is_empty() => {
            warn!("FOLLOWERS is ignored on a follower node");
            Arc::new(NoopReplicator)
        }
        _ => Arc::new(NoopReplicator),
    };

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    let server = Server::new(config.role, cache, replicator, ServerLimits::from_config(&config));
    server.run_until(listener, shutdown_signal()).await?;

    for handle in background {
        handle.abort();
    }
    info!("server shutdown complete");

    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
