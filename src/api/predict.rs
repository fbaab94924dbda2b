use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use validator::Validate;

use super::error::ApiError;
use super::AppState;
use crate::error::{ForecastError, Result};
use crate::forecast::FeatureMatrix;
use crate::telemetry::PREDICTION_TARGET;

/// Training column names, in the order the serving model was fit on
pub const SERVING_COLUMNS: [&str; 10] = [
    "week_X-2",
    "week_X-3",
    "week_X-4",
    "MA_X-4",
    "dayOfWeek",
    "weekend",
    "holiday",
    "Holiday_ID",
    "hourOfDay",
    "T2M_toc",
];

/// One hour of prepared features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LoadForecastInput {
    /// Demand at the same hour two weeks back
    #[serde(rename = "week_X_2")]
    pub week_x_2: f64,
    #[serde(rename = "week_X_3")]
    pub week_x_3: f64,
    #[serde(rename = "week_X_4")]
    pub week_x_4: f64,
    /// Mean of the three weekly lags above
    #[serde(rename = "MA_X_4")]
    pub ma_x_4: f64,
    #[serde(rename = "dayOfWeek")]
    #[validate(range(min = 0, max = 6))]
    pub day_of_week: i64,
    #[validate(range(min = 0, max = 1))]
    pub weekend: i64,
    #[validate(range(min = 0, max = 1))]
    pub holiday: i64,
    #[serde(rename = "Holiday_ID")]
    #[validate(range(min = 0))]
    pub holiday_id: i64,
    #[serde(rename = "hourOfDay")]
    #[validate(range(min = 0, max = 23))]
    pub hour_of_day: i64,
    /// Air temperature (°C)
    #[serde(rename = "T2M_toc")]
    pub t2m_toc: f64,
}

impl LoadForecastInput {
    pub fn to_feature_matrix(&self) -> Result<FeatureMatrix> {
        FeatureMatrix::single_row(
            SERVING_COLUMNS.iter().map(|c| c.to_string()).collect(),
            vec![
                self.week_x_2,
                self.week_x_3,
                self.week_x_4,
                self.ma_x_4,
                self.day_of_week as f64,
                self.weekend as f64,
                self.holiday as f64,
                self.holiday_id as f64,
                self.hour_of_day as f64,
                self.t2m_toc,
            ],
        )
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictionResponse {
    #[serde(rename = "predicted_DEMAND")]
    pub predicted_demand: f64,
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn run_prediction(state: &AppState, input: &LoadForecastInput) -> Result<f64> {
    let x = input.to_feature_matrix()?;
    let predicted = state.predictor.predict(&x)?;
    predicted.first().copied().ok_or(ForecastError::InsufficientData {
        required: 1,
        available: 0,
    })
}

/// POST /predict - demand for one hour of prepared features
pub async fn predict(
    State(state): State<AppState>,
    Json(input): Json<LoadForecastInput>,
) -> std::result::Result<Json<PredictionResponse>, ApiError> {
    input.validate()?;

    match run_prediction(&state, &input) {
        Ok(value) => {
            let predicted_demand = round_2(value);
            info!(
                target: PREDICTION_TARGET,
                model_id = %state.model_id,
                input = ?input,
                predicted_demand,
                "prediction"
            );
            Ok(Json(PredictionResponse { predicted_demand }))
        }
        Err(e) => {
            error!(
                target: PREDICTION_TARGET,
                model_id = %state.model_id,
                input = ?input,
                error = %e,
                "prediction failed"
            );
            Err(ApiError::PredictionFailed(e))
        }
    }
}
