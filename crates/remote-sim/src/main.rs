use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use remote_sim::{start_server, SimOptions, Simulation};
use tokio::sync::RwLock;
use tracing::info;

/// Serve the remote control API from an in-memory simulation.
#[derive(Debug, Parser)]
#[command(name = "remote-sim", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8090")]
    bind: SocketAddr,

    /// Probability that a status request fails, to exercise reconnects.
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,remote_sim=debug")),
        )
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.failure_rate) {
        anyhow::bail!("--failure-rate must be between 0 and 1");
    }

    let sim = Arc::new(RwLock::new(Simulation::new()));
    let options = SimOptions {
        failure_rate: args.failure_rate,
    };
    let (addr, server) = start_server(args.bind, sim, options).await?;
    info!("press Ctrl-C to stop (http://{})", addr);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
        _ = server => {}
    }
    Ok(())
}
