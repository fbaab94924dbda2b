pub mod error;
pub mod health;
pub mod predict;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::ml::DemandPredictor;

/// Shared, read-only serving state
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<dyn DemandPredictor>,
    pub model_id: String,
}

impl AppState {
    pub fn new(predictor: Arc<dyn DemandPredictor>) -> Self {
        let model_id = predictor
            .metadata()
            .map(|m| m.model_id.clone())
            .unwrap_or_else(|| "untrained".to_string());
        Self {
            predictor,
            model_id,
        }
    }
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    Router::new()
        .route("/predict", post(predict::predict))
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
                .layer(timeout_layer(cfg.server.request_timeout_secs)),
        )
        .layer(TraceLayer::new_for_http())
}

/// Requests running longer than `secs` are answered with 408
fn timeout_layer(secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
}
