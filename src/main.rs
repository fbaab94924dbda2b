use anyhow::{Context, Result};
use clap::Parser;
use load_forecaster::cli::{self, Cli, Commands};
use load_forecaster::{api, config::Config, ml, telemetry};
use std::io::{self, Write};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let cfg = Config::load_from(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    let _guard = telemetry::init_tracing(&cfg.logging)?;

    match args.command {
        Commands::Train {
            data,
            prepared,
            output,
            cv_folds,
        } => {
            let summary = cli::train(&cfg, &data, prepared, output.as_deref(), cv_folds)?;
            cli::print_train_summary(&mut io::stdout().lock(), &summary)?;
        }
        Commands::Predict { data, model } => {
            let predictions = cli::predict(&cfg, &data, model.as_deref())?;
            let mut out = io::stdout().lock();
            writeln!(out, "timestamp,prediction")?;
            for (timestamp, value) in predictions {
                writeln!(out, "{},{:.2}", timestamp, value)?;
            }
        }
        Commands::Serve { model } => {
            let path = model.unwrap_or_else(|| cfg.model.artifact_path.clone());
            let predictor = ml::load_predictor(&path)
                .with_context(|| format!("loading model {}", path.display()))?;
            let state = api::AppState::new(predictor);
            let app = api::router(state.clone(), &cfg);

            let addr = cfg.server.socket_addr()?;
            if cfg.server.host == "0.0.0.0" {
                warn!("server binding to 0.0.0.0 - service will be accessible from network");
            }
            info!(%addr, model_id = %state.model_id, "starting load forecaster");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app)
                .with_graceful_shutdown(telemetry::shutdown_signal())
                .await?;

            warn!("shutdown complete");
        }
    }

    Ok(())
}
