//! Per-Connection Session State Machine
//!
//! One `Session` runs per accepted worker connection, through three states:
//! await-handshake, active, terminated.
//!
//! ## Responsibilities
//! - **Admission**: validating the worker's declared capacity and handing it
//!   the target digest, or turning it away (`ND`) when no work exists.
//! - **Allocation**: popping up to `capacity` contiguous chunks per `AL`
//!   request and replying with the coalesced range.
//! - **Liveness**: treating silence past the liveness window exactly like a
//!   disconnect.
//! - **Reclaim**: returning the in-flight allocation to the queue whenever
//!   the worker dies without reporting.
//! - **Stop propagation**: broadcasting a `FN` stop notice once the fleet
//!   signal is set, and setting it when this worker reports the match.
//!
//! Socket reads happen in a reader sidecar that forwards frames over a
//! channel; the session loop selects between that channel and a bounded poll
//! tick, so the stop signal and the liveness deadline are observed even when
//! the worker goes quiet.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::protocol::{decode_u32, encode_range, spawn_frame_reader, write_frame, Frame, OpCode};
use crate::queue::{Range, WorkQueue};

use super::signal::StopSignal;
use super::types::{ServerConfig, SessionId};

/// Server-side state for one connected worker.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    queue: Arc<WorkQueue>,
    signal: Arc<StopSignal>,
    target: Arc<str>,
    config: ServerConfig,
    /// Chunks allocated to this worker and not yet superseded by a newer
    /// request; these go back to the queue if the worker dies.
    held: Vec<Range>,
}

impl Session {
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        queue: Arc<WorkQueue>,
        signal: Arc<StopSignal>,
        target: Arc<str>,
        config: ServerConfig,
    ) -> Self {
        Self {
            id,
            peer,
            queue,
            signal,
            target,
            config,
            held: Vec::new(),
        }
    }

    /// Drives the connection to termination, then reclaims whatever the
    /// worker still held. Never propagates an error to the caller; a broken
    /// session is an ordinary event, contained here.
    pub async fn run(mut self, stream: TcpStream) {
        let peer = self.peer;
        if let Err(e) = self.drive(stream).await {
            tracing::warn!("session {} ({}) failed: {:#}", self.id, peer, e);
        }
        self.reclaim();
    }

    async fn drive(&mut self, stream: TcpStream) -> Result<()> {
        let (read_half, mut writer) = stream.into_split();
        let mut frames = spawn_frame_reader(read_half);

        match self.handshake(&mut frames, &mut writer).await? {
            Some(capacity) => self.serve(&mut frames, &mut writer, capacity).await,
            None => Ok(()),
        }
    }

    /// The await-handshake state. Returns the admitted capacity, or `None`
    /// when the session terminated without being admitted (no work, bad
    /// opening frame, non-positive capacity, or a worker that never spoke).
    async fn handshake(
        &self,
        frames: &mut mpsc::Receiver<Frame>,
        writer: &mut OwnedWriteHalf,
    ) -> Result<Option<u64>> {
        let frame = match tokio::time::timeout(self.config.liveness_window, frames.recv()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!("session {} closed before the handshake", self.id);
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!("session {} sent nothing within the liveness window", self.id);
                return Ok(None);
            }
        };

        if frame.op != OpCode::Handshake {
            tracing::warn!(
                "session {} opened with {} instead of a handshake",
                self.id,
                frame.op
            );
            return Ok(None);
        }

        if self.queue.is_empty() {
            // No work exists; never admit the worker.
            write_frame(writer, OpCode::NotNeeded, &[]).await?;
            tracing::info!("session {} turned away, queue already empty", self.id);
            return Ok(None);
        }

        let capacity = match decode_u32(&frame.payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("session {} sent a malformed capacity: {:#}", self.id, e);
                return Ok(None);
            }
        };
        if capacity == 0 {
            tracing::warn!("session {} declared zero capacity, rejecting", self.id);
            return Ok(None);
        }

        write_frame(writer, OpCode::Handshake, self.target.as_bytes()).await?;
        tracing::info!(
            "session {} ({}) admitted with capacity {}",
            self.id,
            self.peer,
            capacity
        );
        Ok(Some(capacity))
    }

    /// The active state: allocate/heartbeat loop until a terminal event.
    async fn serve(
        &mut self,
        frames: &mut mpsc::Receiver<Frame>,
        writer: &mut OwnedWriteHalf,
        capacity: u64,
    ) -> Result<()> {
        let mut last_activity = Instant::now();
        let mut poll = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                received = frames.recv() => {
                    let Some(frame) = received else {
                        tracing::info!("session {} disconnected", self.id);
                        return Ok(());
                    };
                    last_activity = Instant::now();

                    match frame.op {
                        OpCode::Heartbeat => {
                            tracing::trace!("session {} heartbeat", self.id);
                        }
                        OpCode::Allocate => {
                            if !self.allocate(writer, capacity).await? {
                                return Ok(());
                            }
                        }
                        OpCode::Found => {
                            self.record_found(&frame.payload);
                            return Ok(());
                        }
                        other => {
                            tracing::warn!(
                                "session {} sent an unexpected {} while active",
                                self.id,
                                other
                            );
                            return Ok(());
                        }
                    }
                }
                _ = poll.tick() => {
                    if self.signal.is_set() {
                        // Best-effort stop notice; the worker may already be gone.
                        let _ = write_frame(writer, OpCode::Found, &[]).await;
                        tracing::debug!("session {} notified of the fleet stop", self.id);
                        return Ok(());
                    }
                    if last_activity.elapsed() > self.config.liveness_window {
                        tracing::warn!(
                            "session {} missed the liveness window, treating as dead",
                            self.id
                        );
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Answers one `AL` request. Returns `false` once the session is done
    /// (queue drained), `true` to keep serving.
    async fn allocate(&mut self, writer: &mut OwnedWriteHalf, capacity: u64) -> Result<bool> {
        // A new request means the previous allocation came back exhausted.
        self.held.clear();

        let popped = self.queue.pop_contiguous(capacity as usize);
        let Some(merged) = Range::coalesce(&popped) else {
            write_frame(writer, OpCode::NotNeeded, &[]).await?;
            tracing::info!(
                "session {} drained the queue, requesting fleet stop",
                self.id
            );
            self.signal.request_stop();
            return Ok(false);
        };

        self.held = popped;
        let payload = encode_range(merged.start, merged.end)?;
        write_frame(writer, OpCode::Allocate, &payload).await?;
        tracing::info!(
            "session {} assigned {} ({} chunk(s))",
            self.id,
            merged,
            self.held.len()
        );
        Ok(true)
    }

    /// Handles a `FN` report. First accepted report wins the answer slot.
    fn record_found(&mut self, payload: &[u8]) {
        match decode_u32(payload) {
            Ok(candidate) => {
                if self.signal.try_set(candidate) {
                    tracing::info!("session {} reported the match: {}", self.id, candidate);
                } else {
                    tracing::debug!(
                        "session {} reported {} after the fleet already stopped",
                        self.id,
                        candidate
                    );
                }
                self.held.clear();
            }
            Err(e) => {
                // Treated like any other broken peer: run() reclaims the
                // held chunks.
                tracing::warn!("session {} sent an undecodable report: {:#}", self.id, e);
            }
        }
    }

    fn reclaim(&mut self) {
        if self.held.is_empty() {
            return;
        }
        tracing::info!(
            "session {} returning {} unfinished chunk(s) to the queue",
            self.id,
            self.held.len()
        );
        self.queue.requeue(std::mem::take(&mut self.held));
    }
}
