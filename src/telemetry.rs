use std::fs;

use tokio::signal;
use tracing::info;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::config::LoggingConfig;

/// Target of the per-request prediction log
pub const PREDICTION_TARGET: &str = "predictions";

const DEFAULT_FILTER: &str = "info,tower_http=info,hyper=warn";

/// Install JSON stdout logging plus the prediction log file.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and closes the prediction log writer.
pub fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    fs::create_dir_all(&logging.directory)?;
    let appender = tracing_appender::rolling::never(&logging.directory, &logging.prediction_file);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let stdout = tracing_subscriber::fmt::layer().json().with_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_FILTER.into()),
    );

    let predictions = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(Targets::new().with_target(PREDICTION_TARGET, Level::INFO));

    tracing_subscriber::registry()
        .with(stdout)
        .with(predictions)
        .try_init()?;

    Ok(guard)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    info!("shutdown signal received");
}
