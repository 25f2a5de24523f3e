use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vehicle_server::events::{FanoutSink, FileSink, TracingSink};
use vehicle_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::default(),
    };

    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(path) = &config.log_file {
        let file = FileSink::open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        sink = sink.with(Arc::new(file));
        info!("Session log: {}", path.display());
    }

    let server = Server::bind(&config, Arc::new(sink)).await?;
    info!(
        "Vehicle server starting: capacity={} telemetry every {}s fallback udp={}",
        config.max_sessions, config.telemetry_interval_secs, config.fallback_udp_port
    );

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}
