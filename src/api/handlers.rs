use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{Feature, FeatureVector, ModelMetrics, RiskCategory, MODEL_VERSION};
use crate::prediction::{BatchPrediction, PredictionResult};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        model_trained: state.orchestrator.model().is_trained(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub model_trained: bool,
}

/// Score a single location
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Result<Json<PredictResponse>> {
    let body = parse_body(&body)?;
    let result = state.orchestrator.predict(&body)?;
    Ok(Json(PredictResponse::from(result)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub risk_score: f64,
    pub risk_category: RiskCategory,
    pub coordinates: Coordinates,
    pub timestamp: DateTime<Utc>,
    pub model_confidence: f64,
    pub features_used: FeatureVector,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            risk_score: round2(result.risk_score),
            risk_category: result.category,
            coordinates: Coordinates {
                latitude: result.latitude,
                longitude: result.longitude,
            },
            timestamp: result.timestamp,
            model_confidence: round2(result.confidence),
            features_used: result.features,
        }
    }
}

/// Score a list of locations
pub async fn batch_predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchPredictResponse>> {
    let body = parse_body(&body)?;
    let orchestrator = state.orchestrator.clone();

    // Large batches fan out over rayon; keep them off the async workers.
    let batch = tokio::task::spawn_blocking(move || orchestrator.predict_batch(&body))
        .await
        .map_err(|e| AppError::Internal(format!("batch prediction task failed: {}", e)))??;

    Ok(Json(BatchPredictResponse::from(batch)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchPredictResponse {
    pub predictions: Vec<BatchEntry>,
    pub total_locations: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchEntry {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub risk_score: f64,
    pub risk_category: RiskCategory,
}

impl From<BatchPrediction> for BatchPredictResponse {
    fn from(batch: BatchPrediction) -> Self {
        let predictions: Vec<BatchEntry> = batch
            .results
            .into_iter()
            .map(|result| BatchEntry {
                latitude: result.latitude,
                longitude: result.longitude,
                risk_score: round2(result.risk_score),
                risk_category: result.category,
            })
            .collect();

        Self {
            total_locations: predictions.len(),
            predictions,
            timestamp: batch.timestamp,
        }
    }
}

/// Static model descriptor plus training metadata
pub async fn model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    let model = state.orchestrator.model();
    let metadata = model.metadata();
    let regressor = model.regressor();

    Json(ModelInfoResponse {
        model_type: metadata.model_type.to_string(),
        features: Feature::names(),
        output_range: "0-100".to_string(),
        risk_categories: RiskCategory::labels(),
        trained: model.is_trained(),
        version: MODEL_VERSION.to_string(),
        trained_at: metadata.trained_at,
        training_duration_ms: metadata.training_duration_ms,
        n_training_samples: metadata.n_training_samples,
        n_trees: regressor.n_trees(),
        avg_tree_depth: regressor.avg_depth(),
        total_nodes: regressor.total_nodes(),
        hyperparameters: metadata.hyperparameters.clone(),
        validation_metrics: metadata.validation_metrics.clone(),
        feature_importance: metadata.feature_importance.clone(),
    })
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub features: Vec<&'static str>,
    pub output_range: String,
    pub risk_categories: Vec<&'static str>,
    pub trained: bool,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub training_duration_ms: u64,
    pub n_training_samples: usize,
    pub n_trees: usize,
    pub avg_tree_depth: f64,
    pub total_nodes: usize,
    pub hyperparameters: BTreeMap<String, String>,
    pub validation_metrics: Option<ModelMetrics>,
    pub feature_importance: BTreeMap<String, f64>,
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::gather_metrics(),
    )
        .into_response()
}

/// JSON 404 for unknown routes
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
        .into_response()
}

/// Turns a handler panic into the opaque 500 body; the panic text is only logged.
pub fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    AppError::Internal(format!("handler panicked: {}", detail)).into_response()
}

/// Bodies are taken as raw bytes so malformed JSON maps onto our own error body.
fn parse_body(body: &Bytes) -> Result<Value> {
    serde_json::from_slice(body)
        .map_err(|_| AppError::Validation("Request body must be valid JSON".to_string()))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
