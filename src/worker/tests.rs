//! Worker Module Tests
//!
//! Covers the parallel search executor in isolation, the agent state machine
//! against a scripted server, and one full search with the real coordinator
//! on the other end.
//!
//! ## Test Scopes
//! - **Executor**: short-circuit on match, exhaustion, cooperative cancel.
//! - **Agent Protocol**: outcome mapping for every reply the server can give.
//! - **Full Flow**: dispatcher + agent + digest matcher end to end.

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use tokio::net::{TcpListener, TcpStream};

    use crate::protocol::{
        decode_u32, encode_range, read_frame, write_frame, Frame, OpCode,
    };
    use crate::queue::Range;
    use crate::worker::{
        CancelFlag, CandidateTest, SearchExecutor, TestFactory, WorkerAgent, WorkerConfig,
        WorkerOutcome,
    };

    fn equals(expected: u64) -> CandidateTest {
        Arc::new(move |candidate| candidate == expected)
    }

    fn never() -> CandidateTest {
        Arc::new(|_| false)
    }

    fn factory_for(test: CandidateTest) -> TestFactory {
        Arc::new(move |_announced: &str| test.clone())
    }

    fn quick_config(capacity: u32) -> WorkerConfig {
        WorkerConfig {
            capacity,
            heartbeat_interval: Duration::from_millis(100),
            connect_attempts: 3,
        }
    }

    /// Reads the worker's next frame, skipping heartbeat pings.
    async fn next_request(stream: &mut TcpStream) -> Frame {
        loop {
            let frame = read_frame(stream)
                .await
                .unwrap()
                .expect("worker closed the connection early");
            if frame.op != OpCode::Heartbeat {
                return frame;
            }
        }
    }

    async fn scripted_server() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0".parse::<SocketAddr>().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    // ============================================================
    // SEARCH EXECUTOR
    // ============================================================

    #[tokio::test]
    async fn test_executor_finds_the_match() {
        let executor = SearchExecutor::new(4, equals(57));

        let found = executor.run(Range::new(1, 100), CancelFlag::new()).await;

        assert_eq!(found, Some(57));
    }

    #[tokio::test]
    async fn test_executor_exhausts_without_a_match() {
        let executor = SearchExecutor::new(4, never());

        let found = executor.run(Range::new(1, 100), CancelFlag::new()).await;

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_executor_honors_a_preset_cancel() {
        let executor = SearchExecutor::new(2, equals(5));
        let cancel = CancelFlag::new();
        cancel.set();

        // The match exists, but no lane may schedule a candidate.
        let found = executor.run(Range::new(1, 10), cancel).await;

        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_executor_with_more_lanes_than_candidates() {
        let executor = SearchExecutor::new(16, equals(2));

        let found = executor.run(Range::new(1, 2), CancelFlag::new()).await;

        assert_eq!(found, Some(2));
    }

    #[tokio::test]
    async fn test_executor_tie_resolves_to_either_match() {
        // One match per lane; whichever lane joins first wins the race.
        let twins: CandidateTest = Arc::new(|candidate| candidate == 10 || candidate == 90);
        let executor = SearchExecutor::new(2, twins);

        let found = executor.run(Range::new(1, 100), CancelFlag::new()).await;

        assert!(matches!(found, Some(10) | Some(90)));
        assert!(Range::new(1, 100).contains(found.unwrap()));
    }

    // ============================================================
    // AGENT PROTOCOL
    // ============================================================

    #[tokio::test]
    async fn test_agent_searches_and_reports_the_match() {
        let (listener, addr) = scripted_server().await;

        let script = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            let hello = next_request(&mut stream).await;
            assert_eq!(hello.op, OpCode::Handshake);
            assert_eq!(decode_u32(&hello.payload).unwrap(), 2);
            write_frame(&mut stream, OpCode::Handshake, b"t4rget").await.unwrap();

            let request = next_request(&mut stream).await;
            assert_eq!(request.op, OpCode::Allocate);
            write_frame(&mut stream, OpCode::Allocate, &encode_range(11, 15).unwrap())
                .await
                .unwrap();

            let report = next_request(&mut stream).await;
            assert_eq!(report.op, OpCode::Found);
            assert_eq!(decode_u32(&report.payload).unwrap(), 13);
        });

        let agent = WorkerAgent::new(addr, factory_for(equals(13)), quick_config(2));
        assert_eq!(agent.run().await.unwrap(), WorkerOutcome::Found(13));

        script.await.unwrap();
    }

    #[tokio::test]
    async fn test_agent_keeps_requesting_until_not_needed() {
        let (listener, addr) = scripted_server().await;

        let script = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            next_request(&mut stream).await;
            write_frame(&mut stream, OpCode::Handshake, b"t4rget").await.unwrap();

            // One fruitless range, then the queue is dry.
            next_request(&mut stream).await;
            write_frame(&mut stream, OpCode::Allocate, &encode_range(1, 5).unwrap())
                .await
                .unwrap();
            next_request(&mut stream).await;
            write_frame(&mut stream, OpCode::NotNeeded, &[]).await.unwrap();
        });

        let agent = WorkerAgent::new(addr, factory_for(never()), quick_config(1));
        assert_eq!(agent.run().await.unwrap(), WorkerOutcome::Exhausted);

        script.await.unwrap();
    }

    #[tokio::test]
    async fn test_agent_stops_when_another_worker_won() {
        let (listener, addr) = scripted_server().await;

        let script = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            next_request(&mut stream).await;
            write_frame(&mut stream, OpCode::Handshake, b"t4rget").await.unwrap();

            // The allocate request is answered with the stop broadcast.
            next_request(&mut stream).await;
            write_frame(&mut stream, OpCode::Found, &[]).await.unwrap();
        });

        let agent = WorkerAgent::new(addr, factory_for(never()), quick_config(1));
        assert_eq!(agent.run().await.unwrap(), WorkerOutcome::Stopped);

        script.await.unwrap();
    }

    #[tokio::test]
    async fn test_agent_without_a_target_goes_home() {
        let (listener, addr) = scripted_server().await;

        let script = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            next_request(&mut stream).await;
            write_frame(&mut stream, OpCode::NotNeeded, &[]).await.unwrap();

            // Hold the socket until the agent has read the reply.
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let agent = WorkerAgent::new(addr, factory_for(never()), quick_config(1));
        assert_eq!(agent.run().await.unwrap(), WorkerOutcome::NoTarget);

        script.await.unwrap();
    }

    #[tokio::test]
    async fn test_agent_cancels_a_running_search_on_the_stop_broadcast() {
        let (listener, addr) = scripted_server().await;

        let script = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();

            next_request(&mut stream).await;
            write_frame(&mut stream, OpCode::Handshake, b"t4rget").await.unwrap();

            next_request(&mut stream).await;
            write_frame(&mut stream, OpCode::Allocate, &encode_range(1, 10_000).unwrap())
                .await
                .unwrap();

            // Push the stop notice while the lanes are grinding.
            tokio::time::sleep(Duration::from_millis(100)).await;
            write_frame(&mut stream, OpCode::Found, &[]).await.unwrap();

            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        // ~2ms per candidate: the full range would take many seconds.
        let grind: CandidateTest = Arc::new(|_| {
            std::thread::sleep(Duration::from_millis(2));
            false
        });
        let agent = WorkerAgent::new(addr, factory_for(grind), quick_config(2));

        let started = Instant::now();
        assert_eq!(agent.run().await.unwrap(), WorkerOutcome::Stopped);
        assert!(
            started.elapsed() < Duration::from_secs(3),
            "stop notice did not cancel the search"
        );

        script.await.unwrap();
    }

    // ============================================================
    // FULL FLOW
    // ============================================================

    #[tokio::test]
    async fn test_full_search_against_the_real_coordinator() {
        use crate::digest;
        use crate::queue::WorkQueue;
        use crate::server::{Dispatcher, SearchOutcome, ServerConfig};

        let config = ServerConfig {
            poll_interval: Duration::from_millis(50),
            liveness_window: Duration::from_secs(2),
            grace_period: Duration::from_millis(200),
        };
        let queue = Arc::new(WorkQueue::new(1, 20, 5));
        let target = digest::digest_hex(13);

        let dispatcher = Dispatcher::bind(
            "127.0.0.1:0".parse().unwrap(),
            target,
            queue,
            config,
        )
        .await
        .unwrap();
        let addr = dispatcher.local_addr().unwrap();
        let run = tokio::spawn(dispatcher.run());

        let factory: TestFactory = Arc::new(|announced: &str| digest::matcher_for(announced));
        let agent = WorkerAgent::new(addr, factory, quick_config(1));

        assert_eq!(agent.run().await.unwrap(), WorkerOutcome::Found(13));
        assert_eq!(run.await.unwrap().unwrap(), SearchOutcome::Found(13));
    }
}
