//! Follower Links
//!
//! One background task per follower owns an outbound connection and drains
//! a bounded queue of encoded commands in order.

use std::fmt;
use std::io::ErrorKind;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::error::{CacheError, Result};
use crate::protocol::Command;
use crate::replication::{ReplicationOptions, Replicator, MAX_BACKOFF};

// == Follower Set ==
/// Replicator that fans commands out to every configured follower.
#[derive(Debug)]
pub struct FollowerSet {
    links: Vec<FollowerHandle>,
}

#[derive(Debug)]
struct FollowerHandle {
    addr: String,
    queue: mpsc::Sender<Bytes>,
}

impl FollowerSet {
    /// Starts one link task per follower address.
    ///
    /// Returns the replicator and the link task handles. Links stop on their
    /// own once the FollowerSet is dropped and their queues drain.
    pub fn spawn(addrs: &[String], options: ReplicationOptions) -> (Self, Vec<JoinHandle<()>>) {
        let mut links = Vec::with_capacity(addrs.len());
        let mut handles = Vec::with_capacity(addrs.len());

        for addr in addrs {
            let (queue, rx) = mpsc::channel(options.queue_depth.max(1));
            let link = FollowerLink {
                addr: addr.clone(),
                options: options.clone(),
                stream: None,
            };
            handles.push(tokio::spawn(link.run(rx)));
            links.push(FollowerHandle {
                addr: addr.clone(),
                queue,
            });
        }

        (Self { links }, handles)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl Replicator for FollowerSet {
    fn replicate(&self, command: &Command) {
        if !command.is_mutating() {
            return;
        }

        let frame = command.encode();
        for link in &self.links {
            match link.queue.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(follower = %link.addr, key = command.key(), "replication queue full, dropping command");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!(follower = %link.addr, "replication link stopped, dropping command");
                }
            }
        }
    }
}

// == Follower Link ==
struct FollowerLink {
    addr: String,
    options: ReplicationOptions,
    stream: Option<TcpStream>,
}

impl FollowerLink {
    async fn run(mut self, mut rx: mpsc::Receiver<Bytes>) {
        debug!(follower = %self.addr, "replication link started");

        while let Some(frame) = rx.recv().await {
            self.deliver_with_retry(&frame).await;
        }

        debug!(follower = %self.addr, "replication link stopped");
    }

    async fn deliver_with_retry(&mut self, frame: &Bytes) {
        let max_attempts = self.options.max_attempts.max(1);
        let mut backoff = self.options.backoff;

        for attempt in 1..=max_attempts {
            match self.deliver(frame).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(follower = %self.addr, attempt, "replication recovered");
                    }
                    return;
                }
                Err(err) => {
                    warn!(follower = %self.addr, attempt, error = %err, "replication attempt failed");
                    if attempt < max_attempts {
                        time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }

        error!(
            follower = %self.addr,
            attempts = max_attempts,
            "dropping replicated command after exhausting retries"
        );
    }

    /// Writes one frame, reusing the open connection when it is still healthy.
    ///
    /// On failure the connection is dropped so the next attempt reconnects.
    async fn deliver(&mut self, frame: &Bytes) -> Result<()> {
        let mut stream = match self.stream.take() {
            Some(stream) if self.drain_replies(&stream).is_ok() => stream,
            _ => self.connect().await?,
        };

        match time::timeout(self.options.timeout, stream.write_all(frame)).await {
            Ok(Ok(())) => {
                self.stream = Some(stream);
                Ok(())
            }
            Ok(Err(err)) => Err(self.failure(err)),
            Err(_) => Err(self.failure("write timed out")),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let stream = time::timeout(self.options.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| self.failure("connect timed out"))?
            .map_err(|err| self.failure(err))?;

        stream.set_nodelay(true).map_err(|err| self.failure(err))?;
        info!(follower = %self.addr, "connected to follower");
        Ok(stream)
    }

    /// Reads whatever the follower sent back without blocking.
    ///
    /// Followers stay silent on success, so anything here is an error line.
    /// A closed or broken socket is reported as an error.
    fn drain_replies(&self, stream: &TcpStream) -> Result<()> {
        let mut buf = [0u8; 1024];
        loop {
            match stream.try_read(&mut buf) {
                Ok(0) => {
                    debug!(follower = %self.addr, "follower closed the connection");
                    return Err(self.failure("connection closed by follower"));
                }
                Ok(n) => {
                    let reply = String::from_utf8_lossy(&buf[..n]);
                    warn!(follower = %self.addr, reply = %reply.trim_end(), "follower rejected a replicated command");
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) => return Err(self.failure(err)),
            }
        }
    }

    fn failure(&self, reason: impl fmt::Display) -> CacheError {
        CacheError::Replication {
            addr: self.addr.clone(),
            reason: reason.to_string(),
        }
    }
}
