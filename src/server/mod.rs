//! Server Module
//!
//! TCP accept loop, per-connection handling and command dispatch.

mod connection;
mod dispatcher;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::Cacher;
use crate::config::{Config, ServerRole};
use crate::error::Result;
use crate::protocol::FrameDecoder;
use crate::replication::Replicator;

pub use connection::handle_connection;
pub use dispatcher::Dispatcher;

// == Server Limits ==
/// Resource bounds applied to every connection.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Commands executing at once across all connections
    pub max_inflight_commands: usize,
    /// Largest buffered frame before a connection is rejected
    pub max_frame_len: usize,
}

impl ServerLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_inflight_commands: config.max_inflight_commands,
            max_frame_len: config.max_frame_len,
        }
    }
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

// == Server ==
/// Line-protocol cache server.
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    limiter: Arc<Semaphore>,
    decoder: FrameDecoder,
}

impl Server {
    pub fn new(
        role: ServerRole,
        cache: Arc<dyn Cacher>,
        replicator: Arc<dyn Replicator>,
        limits: ServerLimits,
    ) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(role, cache, replicator)),
            limiter: Arc::new(Semaphore::new(limits.max_inflight_commands.max(1))),
            decoder: FrameDecoder::new(limits.max_frame_len),
        }
    }

    pub fn role(&self) -> ServerRole {
        self.dispatcher.role()
    }

    /// Accepts connections until the process ends.
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        self.run_until(listener, std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!(addr = ?listener.local_addr().ok(), role = %self.role(), "server accepting connections");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("server shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(err) => {
                        warn!(error = %err, "failed to accept connection");
                        // Usually fd exhaustion; back off instead of spinning
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(err) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %err, "failed to set TCP_NODELAY");
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let limiter = Arc::clone(&self.limiter);
        let decoder = self.decoder.clone();

        tokio::spawn(async move {
            debug!(peer = %peer, "connection opened");
            match handle_connection(stream, dispatcher, limiter, decoder).await {
                Ok(()) => debug!(peer = %peer, "connection closed"),
                Err(err) => warn!(peer = %peer, error = %err, "connection closed with error"),
            }
        });
    }
}
