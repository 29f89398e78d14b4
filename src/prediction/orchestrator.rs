use crate::error::{AppError, Result};
use crate::ml::{FeatureVector, RiskCategory, RiskModel};
use crate::prediction::schema::{self, RequestMode, ResolvedRequest};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Scored location
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Clamped to [0, 100], unrounded
    pub risk_score: f64,
    pub category: RiskCategory,
    pub confidence: f64,
    /// Resolved inputs, defaults included
    pub features: FeatureVector,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchPrediction {
    /// One result per input entry, in input order
    pub results: Vec<PredictionResult>,
    pub timestamp: DateTime<Utc>,
}

/// Validates request bodies and runs them through the shared model.
///
/// Holds only read-only state, so a single instance serves every request.
#[derive(Debug, Clone)]
pub struct PredictionOrchestrator {
    model: Arc<RiskModel>,
    max_batch_size: usize,
}

impl PredictionOrchestrator {
    pub fn new(model: Arc<RiskModel>, max_batch_size: usize) -> Self {
        Self {
            model,
            max_batch_size,
        }
    }

    pub fn model(&self) -> &RiskModel {
        &self.model
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Score one location from a `/predict` body
    pub fn predict(&self, body: &Value) -> Result<PredictionResult> {
        let started = Instant::now();
        let map = body
            .as_object()
            .ok_or_else(|| AppError::Validation("Request body must be a JSON object".to_string()))?;

        let request = schema::resolve(map, RequestMode::Single)?;
        let result = self.score(&request, Utc::now())?;

        crate::metrics::record_prediction(RequestMode::Single.as_str(), result.category);
        crate::metrics::record_prediction_latency(
            RequestMode::Single.as_str(),
            started.elapsed().as_secs_f64(),
        );
        info!(
            risk_score = format!("{:.2}", result.risk_score),
            category = %result.category,
            confidence = format!("{:.2}", result.confidence),
            "Prediction made"
        );

        Ok(result)
    }

    /// Score every entry of a `/batch_predict` body, preserving order.
    ///
    /// The batch is all-or-nothing: any invalid entry rejects the request.
    pub fn predict_batch(&self, body: &Value) -> Result<BatchPrediction> {
        let started = Instant::now();
        let map = body
            .as_object()
            .ok_or_else(|| AppError::Validation("Request body must be a JSON object".to_string()))?;

        let locations = match map.get("locations") {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(AppError::Validation(
                    "Field 'locations' must be a list".to_string(),
                ))
            }
        };
        if locations.is_empty() {
            return Err(AppError::Validation("No locations provided".to_string()));
        }
        if locations.len() > self.max_batch_size {
            return Err(AppError::Validation(format!(
                "Too many locations: {} (maximum {})",
                locations.len(),
                self.max_batch_size
            )));
        }

        let requests = locations
            .iter()
            .enumerate()
            .map(|(index, entry)| resolve_entry(index, entry))
            .collect::<Result<Vec<_>>>()?;

        let timestamp = Utc::now();
        let results = requests
            .par_iter()
            .map(|request| self.score(request, timestamp))
            .collect::<Result<Vec<_>>>()?;

        for (index, result) in results.iter().enumerate() {
            crate::metrics::record_prediction(RequestMode::Batch.as_str(), result.category);
            debug!(
                index,
                risk_score = format!("{:.2}", result.risk_score),
                category = %result.category,
                "Batch entry scored"
            );
        }
        crate::metrics::record_batch(results.len());
        crate::metrics::record_prediction_latency(
            RequestMode::Batch.as_str(),
            started.elapsed().as_secs_f64(),
        );
        info!(total_locations = results.len(), "Batch prediction completed");

        Ok(BatchPrediction { results, timestamp })
    }

    fn score(&self, request: &ResolvedRequest, timestamp: DateTime<Utc>) -> Result<PredictionResult> {
        let estimate = self.model.estimate(&request.features)?;
        Ok(PredictionResult {
            risk_score: estimate.score,
            category: estimate.category,
            confidence: estimate.confidence,
            features: request.features,
            latitude: request.latitude,
            longitude: request.longitude,
            timestamp,
        })
    }
}

fn resolve_entry(index: usize, entry: &Value) -> Result<ResolvedRequest> {
    let map = entry.as_object().ok_or_else(|| {
        AppError::Validation(format!("Location at index {} must be a JSON object", index))
    })?;

    schema::resolve(map, RequestMode::Batch).map_err(|e| match e {
        AppError::Validation(message) => {
            AppError::Validation(format!("{} (location {})", message, index))
        }
        other => other,
    })
}
