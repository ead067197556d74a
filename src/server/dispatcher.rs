//! Connection Dispatcher
//!
//! Owns the listening socket and everything the sessions share: the work
//! queue, the target digest, the stop signal, and the session registry.
//!
//! ## Responsibilities
//! - **Accepting**: a bounded poll loop around `accept`, so the stop signal
//!   is observed promptly even when no one is connecting.
//! - **Spawning**: one fire-and-forget session task per connection; each
//!   session deregisters itself when it winds down.
//! - **Shutdown**: once the stop signal is set, stop accepting, give live
//!   sessions a bounded grace period to notice, and report the outcome.
//!
//! Failing to bind the endpoint is the only error that aborts a run; accept
//! errors and anything that happens inside a session are contained.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};

use crate::queue::WorkQueue;

use super::session::Session;
use super::signal::StopSignal;
use super::types::{SearchOutcome, ServerConfig, SessionId};

/// The accept loop and the state shared across every session.
pub struct Dispatcher {
    listener: TcpListener,
    queue: Arc<WorkQueue>,
    target: Arc<str>,
    signal: Arc<StopSignal>,
    sessions: Arc<DashMap<SessionId, SocketAddr>>,
    config: ServerConfig,
}

impl Dispatcher {
    /// Binds the listening endpoint. This is the one fatal failure of the
    /// server side; everything after bind is contained per-session.
    pub async fn bind(
        addr: SocketAddr,
        target: impl Into<Arc<str>>,
        queue: Arc<WorkQueue>,
        config: ServerConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        Ok(Self {
            listener,
            queue,
            target: target.into(),
            signal: Arc::new(StopSignal::new()),
            sessions: Arc::new(DashMap::new()),
            config,
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the fleet-wide stop signal, e.g. for an external shutdown.
    pub fn signal(&self) -> Arc<StopSignal> {
        self.signal.clone()
    }

    /// Runs the search to completion: accepts workers until the stop signal
    /// is set, waits out the grace period, and returns the outcome.
    pub async fn run(self) -> Result<SearchOutcome> {
        tracing::info!(
            "coordinator listening on {}, {} chunk(s) queued",
            self.listener.local_addr()?,
            self.queue.len()
        );

        let mut poll = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_session(stream, peer),
                        Err(e) => tracing::warn!("accept failed: {}", e),
                    }
                }
                _ = poll.tick() => {
                    if self.signal.is_set() {
                        break;
                    }
                }
            }
        }

        self.wind_down().await;

        match self.signal.answer() {
            Some(candidate) => {
                tracing::info!("search finished, answer {}", candidate);
                Ok(SearchOutcome::Found(candidate))
            }
            None => {
                tracing::info!("search finished, domain exhausted with no match");
                Ok(SearchOutcome::Exhausted)
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let id = SessionId::new();
        self.sessions.insert(id.clone(), peer);
        tracing::info!("session {} connected from {}", id, peer);

        let session = Session::new(
            id.clone(),
            peer,
            self.queue.clone(),
            self.signal.clone(),
            self.target.clone(),
            self.config,
        );

        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            session.run(stream).await;
            sessions.remove(&id);
            tracing::info!("session {} closed", id);
        });
    }

    /// Gives already-started sessions a bounded window to notice the stop
    /// signal and self-terminate.
    async fn wind_down(&self) {
        let deadline = Instant::now() + self.config.grace_period;
        while !self.sessions.is_empty() && Instant::now() < deadline {
            tracing::info!(
                "waiting for {} session(s) to wind down",
                self.sessions.len()
            );
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
