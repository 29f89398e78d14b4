//! EmberAlert ML: wildfire risk estimation service.
//!
//! A synthetic corpus trains a bootstrap-aggregated regression forest at
//! startup; the HTTP layer validates feature sets and serves risk scores and
//! categories from the shared, read-only model.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod prediction;

pub use error::{AppError, Result};
