//! Worker Connection State Machine
//!
//! Drives one worker process through connecting, handshaking, working, and
//! done.
//!
//! ## Responsibilities
//! - **Connecting**: bounded retry with exponential backoff and jitter.
//! - **Handshaking**: declare capacity, receive the target digest.
//! - **Working**: request a range, fan it out to the search lanes, report a
//!   match or request the next range.
//! - **Liveness**: a heartbeat sidecar pings the server for the lifetime of
//!   the connection; a failed ping marks the link down.
//!
//! The socket is read by a sidecar task feeding a frame channel, so the
//! agent observes frames arriving outside the request/reply tempo, in
//! particular a stop broadcast pushed while a search is still running. All
//! cancellation is cooperative: the search lanes finish their in-flight
//! candidates and stop scheduling new ones.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::protocol::{decode_range, encode_u32, spawn_frame_reader, write_frame, Frame, OpCode};
use crate::queue::Range;

use super::search::{CancelFlag, SearchExecutor};
use super::types::{TestFactory, WorkerConfig, WorkerOutcome};

/// The protocol loop and the heartbeat both write to the socket.
type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

/// How one range search ended, before it is mapped to an outcome.
enum SearchStep {
    Match(u64),
    NoMatch,
    Stopped,
    Drained,
    Lost,
}

/// One worker process's connection to the coordinator.
pub struct WorkerAgent {
    server: SocketAddr,
    factory: TestFactory,
    config: WorkerConfig,
}

impl WorkerAgent {
    pub fn new(server: SocketAddr, factory: TestFactory, config: WorkerConfig) -> Self {
        Self {
            server,
            factory,
            config,
        }
    }

    /// Runs the agent to its terminal state.
    ///
    /// Only failing to reach the server at all is an `Err`; everything after
    /// a connection exists maps to a [`WorkerOutcome`].
    pub async fn run(&self) -> Result<WorkerOutcome> {
        let stream = self.connect_with_retry().await?;
        let (read_half, write_half) = stream.into_split();
        let writer: SharedWriter = Arc::new(Mutex::new(write_half));
        let mut frames = spawn_frame_reader(read_half);

        let Some(target) = self.handshake(&mut frames, &writer).await? else {
            return Ok(WorkerOutcome::NoTarget);
        };
        tracing::info!("searching for the preimage of {}", target);

        let test = (self.factory)(&target);
        let executor = SearchExecutor::new(self.config.capacity as usize, test);

        let link_down = CancelFlag::new();
        let heartbeat = self.spawn_heartbeat(writer.clone(), link_down.clone());

        let outcome = self
            .work_loop(&mut frames, &writer, &executor, &link_down)
            .await;

        heartbeat.abort();
        tracing::info!("worker done: {:?}", outcome);
        Ok(outcome)
    }

    async fn connect_with_retry(&self) -> Result<TcpStream> {
        let mut delay_ms = 150u64;
        for attempt in 0..self.config.connect_attempts {
            match TcpStream::connect(self.server).await {
                Ok(stream) => {
                    tracing::info!("connected to {}", self.server);
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::warn!("connect attempt {} failed: {}", attempt + 1, e);
                    if attempt + 1 == self.config.connect_attempts {
                        return Err(e.into());
                    }
                    // Jitter keeps a restarted fleet from reconnecting in
                    // lockstep.
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }
        Err(anyhow!("connect attempts exhausted"))
    }

    /// Declares capacity and waits for the target digest. `None` for any
    /// handshake that does not produce a usable target.
    async fn handshake(
        &self,
        frames: &mut mpsc::Receiver<Frame>,
        writer: &SharedWriter,
    ) -> Result<Option<String>> {
        let capacity = encode_u32(u64::from(self.config.capacity))?;
        if !self.send(writer, OpCode::Handshake, &capacity).await {
            return Ok(None);
        }

        let Some(reply) = frames.recv().await else {
            tracing::warn!("server closed during the handshake");
            return Ok(None);
        };
        if reply.op != OpCode::Handshake {
            tracing::warn!("server answered the handshake with {}", reply.op);
            return Ok(None);
        }

        match String::from_utf8(reply.payload) {
            Ok(target) if !target.trim().is_empty() => Ok(Some(target.trim().to_string())),
            _ => {
                tracing::warn!("server sent an unusable target digest");
                Ok(None)
            }
        }
    }

    /// The working state: allocate, search, report, repeat.
    async fn work_loop(
        &self,
        frames: &mut mpsc::Receiver<Frame>,
        writer: &SharedWriter,
        executor: &SearchExecutor,
        link_down: &CancelFlag,
    ) -> WorkerOutcome {
        loop {
            if link_down.is_set() {
                return WorkerOutcome::ConnectionLost;
            }

            if !self.send(writer, OpCode::Allocate, &[]).await {
                return WorkerOutcome::ConnectionLost;
            }

            let Some(reply) = frames.recv().await else {
                return WorkerOutcome::ConnectionLost;
            };

            match reply.op {
                OpCode::Allocate => {
                    let assigned = match decode_range(&reply.payload) {
                        Ok((start, end)) => Range::new(start, end),
                        Err(e) => {
                            tracing::warn!("undecodable assignment: {:#}", e);
                            return WorkerOutcome::ConnectionLost;
                        }
                    };
                    tracing::info!("got range: {}", assigned);

                    match self.search_range(frames, executor, assigned).await {
                        SearchStep::Match(candidate) => {
                            let report = match encode_u32(candidate) {
                                Ok(packed) => packed,
                                Err(e) => {
                                    tracing::error!("cannot report {}: {:#}", candidate, e);
                                    return WorkerOutcome::ConnectionLost;
                                }
                            };
                            if !self.send(writer, OpCode::Found, &report).await {
                                return WorkerOutcome::ConnectionLost;
                            }
                            return WorkerOutcome::Found(candidate);
                        }
                        SearchStep::NoMatch => {
                            tracing::info!("no match in {}", assigned);
                        }
                        SearchStep::Stopped => return WorkerOutcome::Stopped,
                        SearchStep::Drained => return WorkerOutcome::Exhausted,
                        SearchStep::Lost => return WorkerOutcome::ConnectionLost,
                    }
                }
                OpCode::NotNeeded => return WorkerOutcome::Exhausted,
                OpCode::Found => return WorkerOutcome::Stopped,
                other => {
                    tracing::warn!("unexpected {} from the server", other);
                    return WorkerOutcome::ConnectionLost;
                }
            }
        }
    }

    /// Runs the executor over one range while still watching the frame
    /// channel, so an unsolicited stop notice cancels the search instead of
    /// waiting behind it.
    async fn search_range(
        &self,
        frames: &mut mpsc::Receiver<Frame>,
        executor: &SearchExecutor,
        assigned: Range,
    ) -> SearchStep {
        let cancel = CancelFlag::new();
        let lanes = executor.clone();
        let lane_cancel = cancel.clone();
        let mut search = tokio::spawn(async move { lanes.run(assigned, lane_cancel).await });

        tokio::select! {
            joined = &mut search => match joined {
                Ok(Some(candidate)) => SearchStep::Match(candidate),
                Ok(None) => SearchStep::NoMatch,
                Err(e) => {
                    tracing::error!("search task failed: {}", e);
                    SearchStep::Lost
                }
            },
            received = frames.recv() => {
                cancel.set();
                let interrupted = match received {
                    Some(frame) if frame.op == OpCode::Found => SearchStep::Stopped,
                    Some(frame) if frame.op == OpCode::NotNeeded => SearchStep::Drained,
                    Some(frame) => {
                        tracing::warn!("unexpected {} while searching", frame.op);
                        SearchStep::Lost
                    }
                    None => SearchStep::Lost,
                };
                // Lanes finish their in-flight candidates; if one of them
                // found the match in the same instant, prefer reporting it:
                // the server's first-writer answer slot makes a late report
                // harmless.
                match (&mut search).await {
                    Ok(Some(candidate)) => SearchStep::Match(candidate),
                    _ => interrupted,
                }
            }
        }
    }

    fn spawn_heartbeat(&self, writer: SharedWriter, link_down: CancelFlag) -> JoinHandle<()> {
        let cadence = self.config.heartbeat_interval;
        tokio::spawn(async move {
            let mut beat = tokio::time::interval(cadence);
            loop {
                beat.tick().await;
                if link_down.is_set() {
                    break;
                }
                let mut writer = writer.lock().await;
                if write_frame(&mut *writer, OpCode::Heartbeat, &[])
                    .await
                    .is_err()
                {
                    tracing::warn!("heartbeat failed, marking the link down");
                    link_down.set();
                    break;
                }
            }
        })
    }

    async fn send(&self, writer: &SharedWriter, op: OpCode, payload: &[u8]) -> bool {
        let mut writer = writer.lock().await;
        match write_frame(&mut *writer, op, payload).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("sending {} failed: {:#}", op, e);
                false
            }
        }
    }
}
