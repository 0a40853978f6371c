//! rbd-brokerd - RBD broker daemon.

use std::sync::Arc;

use clap::Parser;
use rbd_broker::{Broker, SystemRunner};
use rbd_brokerd::config::LogFormat;
use rbd_brokerd::{AppState, Args, Config, api};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = Config::from_args(args)?;
    let runner = Arc::new(SystemRunner::new().with_timeout(config.command_timeout));
    let broker = Broker::new(runner.clone(), &config.paths);
    let app = api::server::app(AppState::new(broker, config.credentials.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!(
        rbd = %config.paths.rbd.display(),
        timeout = ?runner.timeout(),
        user = config.credentials.user(),
        "rbd-brokerd listening on {}",
        config.listen
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("rbd-brokerd stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    ));

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
