mod config;
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod console;
mod driver;
mod server;
use floodcache_core::{
    ConsistencyMode, HttpTransport, JoinOperation, Peer, PeerConfig, ShutdownOperation,
};
use server::run_server;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "floodcache")]
#[command(about = "Peer for an unstructured file-sharing overlay with cache consistency")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a peer
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Consistency mode, overriding the configuration file (push or pull)
        #[arg(long)]
        mode: Option<ConsistencyMode>,

        /// What drives this peer once it has joined the overlay
        #[arg(long, value_enum, default_value_t = Driver::Console)]
        driver: Driver,

        /// Mean delay between automatic actions in milliseconds (defaults to the TTR)
        #[arg(long)]
        lambda_ms: Option<u64>,

        /// Number of requests issued by the auto driver
        #[arg(long, default_value_t = 200)]
        iterations: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Driver {
    /// Interactive prompt on stdin
    Console,
    /// Random requests for test files
    Auto,
    /// Random modifications of this peer's own test file
    Modifier,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "floodcache=info,floodcache_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            mode,
            driver,
            lambda_ms,
            iterations,
        } => {
            tracing::info!("Starting floodcache peer with config: {}", config);

            let cfg = match Config::from_file(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            let runtime_config = match cfg.runtime(mode) {
                Ok(runtime) => runtime,
                Err(error) => {
                    tracing::error!("Failed to build runtime config: {}", error);
                    std::process::exit(1);
                }
            };

            tracing::info!(
                "Peer ID: {}, Mode: {}, Neighbors: {:?}, TTR: {:?}",
                runtime_config.peer_id,
                runtime_config.mode,
                runtime_config.neighbors,
                runtime_config.ttr
            );

            let lambda = lambda_ms
                .map(Duration::from_millis)
                .unwrap_or(runtime_config.ttr);

            if let Err(e) = run_peer(&cfg, runtime_config, driver, lambda, iterations).await {
                tracing::error!("Peer error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run_peer(
    cfg: &Config,
    runtime_config: PeerConfig,
    driver: Driver,
    lambda: Duration,
    iterations: u32,
) -> anyhow::Result<()> {
    let addr = cfg.bind_addr()?;
    let transport = Arc::new(HttpTransport::new(&cfg.host, cfg.base_port)?);
    let peer = Peer::open(runtime_config, transport).await?;

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(run_server(peer.clone(), addr, async {
        let _ = stop_rx.await;
    }));

    let joined = JoinOperation::new(peer.clone()).run().await?;
    tracing::info!(
        "Joined overlay: connected {:?}, unreachable {:?}",
        joined.connected,
        joined.unreachable
    );

    match driver {
        Driver::Console => {
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            tokio::select! {
                result = console::run_console(peer.clone(), input, std::io::stdout()) => result?,
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
            }
        }
        Driver::Auto => {
            tokio::select! {
                _ = driver::run_auto(peer.clone(), iterations, lambda) => {
                    tracing::info!("Auto driver finished {} requests", iterations);
                }
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
            }
        }
        Driver::Modifier => {
            tokio::select! {
                _ = driver::run_modifier(peer.clone(), lambda) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
            }
        }
    }

    ShutdownOperation::new(peer).run().await;

    let _ = stop_tx.send(());
    server.await??;

    Ok(())
}
