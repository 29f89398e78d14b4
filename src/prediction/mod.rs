//! Request validation and scoring on top of the trained model.

pub mod orchestrator;
pub mod schema;

pub use orchestrator::{BatchPrediction, PredictionOrchestrator, PredictionResult};
pub use schema::{
    required_fields, resolve, FieldSpec, FieldTarget, Presence, RequestMode, ResolvedRequest,
    REQUEST_SCHEMA,
};
