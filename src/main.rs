//! wsmux relay server
//!
//! Multiplexes newline-delimited HTTP streams over one WebSocket per client.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsmux::{AutoupdateResolver, Backend, RelayConfig, RelayServer, SessionContext};

#[derive(Parser, Debug)]
#[command(name = "wsmux")]
#[command(version, about = "WebSocket relay for streaming HTTP subscriptions")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:9013")]
    listen_addr: SocketAddr,

    /// Host of the autoupdate backend.
    #[arg(long, env = "AUTOUPDATE_HOST", default_value = "localhost")]
    autoupdate_host: String,

    /// Port of the autoupdate backend.
    #[arg(long, env = "AUTOUPDATE_PORT", default_value_t = 8002)]
    autoupdate_port: u16,

    /// Scheme used to reach the autoupdate backend.
    #[arg(long, env = "AUTOUPDATE_PROTOCOL", default_value = "http")]
    autoupdate_protocol: String,

    /// Outbound events buffered per client before backends are paused.
    #[arg(long, env = "WSMUX_QUEUE_CAPACITY", default_value_t = 1)]
    queue_capacity: usize,

    /// Longest accepted backend line in bytes. Unbounded when unset.
    #[arg(long, env = "WSMUX_MAX_LINE_BYTES")]
    max_line_bytes: Option<usize>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "wsmux=info".into()),
    );
    if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut builder = RelayConfig::builder()
        .listen_addr(args.listen_addr)
        .queue_capacity(args.queue_capacity);
    if let Some(max) = args.max_line_bytes {
        builder = builder.max_line_bytes(max);
    }
    let config = builder.build()?;

    let resolver = AutoupdateResolver::new(
        &args.autoupdate_protocol,
        &args.autoupdate_host,
        args.autoupdate_port,
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.listen_addr,
        autoupdate = %resolver.target(),
        "Starting wsmux"
    );

    let context = SessionContext::new(Arc::new(resolver), Backend::new()?, &config);
    let server = RelayServer::bind(config.listen_addr, context).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    server.serve(shutdown).await?;

    info!("Relay stopped");
    Ok(())
}

/// Cancels `shutdown` on the first signal and exits on the second.
async fn watch_signals(shutdown: CancellationToken) {
    wait_for_signal().await;
    info!("Received shutdown signal");
    shutdown.cancel();

    wait_for_signal().await;
    warn!("Received second signal, exiting");
    std::process::exit(1);
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Installing SIGTERM handler failed");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
