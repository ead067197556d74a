use std::net::SocketAddr;
use std::sync::Arc;

use distributed_cracker::digest;
use distributed_cracker::queue::WorkQueue;
use distributed_cracker::server::{Dispatcher, SearchOutcome, ServerConfig};
use distributed_cracker::worker::{TestFactory, WorkerAgent, WorkerConfig, WorkerOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "serve" => serve(&args).await,
        "work" => work(&args).await,
        _ => {
            usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn usage(program: &str) {
    eprintln!(
        "Usage: {} serve --bind <addr:port> (--secret <number> | --target <hex>) [--max <n>] [--chunk <n>]",
        program
    );
    eprintln!("       {} work --connect <addr:port> [--lanes <n>]", program);
    eprintln!("Example: {} serve --bind 0.0.0.0:4587 --secret 4567897", program);
    eprintln!("Example: {} work --connect 127.0.0.1:4587", program);
}

async fn serve(args: &[String]) -> anyhow::Result<()> {
    let mut bind_addr: Option<SocketAddr> = None;
    let mut secret: Option<u64> = None;
    let mut target: Option<String> = None;
    let mut max_value: u64 = 9_999_999;
    let mut chunk_size: u64 = 100_000;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--secret" => {
                secret = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--target" => {
                target = Some(args[i + 1].clone());
                i += 2;
            }
            "--max" => {
                max_value = args[i + 1].parse()?;
                i += 2;
            }
            "--chunk" => {
                chunk_size = args[i + 1].parse()?;
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.expect("--bind is required");
    let target = match (target, secret) {
        (Some(hex), _) => hex,
        (None, Some(number)) => digest::digest_hex(number),
        (None, None) => {
            eprintln!("either --target or --secret is required");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "coordinating a search over 1-{} in chunks of {}",
        max_value,
        chunk_size
    );

    let queue = Arc::new(WorkQueue::new(1, max_value, chunk_size));
    let dispatcher = Dispatcher::bind(bind_addr, target, queue, ServerConfig::default()).await?;

    match dispatcher.run().await? {
        SearchOutcome::Found(candidate) => println!("found: {}", candidate),
        SearchOutcome::Exhausted => println!("not found"),
    }

    Ok(())
}

async fn work(args: &[String]) -> anyhow::Result<()> {
    let mut server: Option<SocketAddr> = None;
    let mut config = WorkerConfig::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--connect" => {
                server = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--lanes" => {
                config.capacity = args[i + 1].parse()?;
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let server = server.expect("--connect is required");

    let factory: TestFactory = Arc::new(|announced: &str| digest::matcher_for(announced));
    let agent = WorkerAgent::new(server, factory, config);

    match agent.run().await? {
        WorkerOutcome::Found(candidate) => println!("found: {}", candidate),
        WorkerOutcome::Stopped => println!("stopped: another worker already won"),
        WorkerOutcome::Exhausted => println!("exhausted: no work left to claim"),
        WorkerOutcome::NoTarget => {
            eprintln!("the server had no target for us");
            std::process::exit(1);
        }
        WorkerOutcome::ConnectionLost => {
            eprintln!("connection to the coordinator lost");
            std::process::exit(1);
        }
    }

    Ok(())
}
