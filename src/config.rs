use crate::error::{AppError, Result};
use crate::ml::features::FEATURE_COUNT;
use crate::ml::models::{ForestParams, TrainingFingerprint};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model training configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (EMBERALERT_SECTION__KEY)
            .add_source(
                config::Environment::with_prefix("EMBERALERT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject parameter combinations the trainer cannot honour
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.model.check()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Largest accepted `locations` list
    #[serde(default = "default_max_batch_size")]
    #[validate(range(min = 1))]
    pub max_batch_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModelConfig {
    /// Synthetic training corpus size
    #[serde(default = "default_n_samples")]
    #[validate(range(min = 1))]
    pub n_samples: usize,

    /// Seed for corpus generation and forest training
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Standard deviation of the label noise
    #[serde(default = "default_noise_std")]
    #[validate(range(min = 0.0))]
    pub noise_std: f64,

    /// Number of trees
    #[serde(default = "default_tree_count")]
    #[validate(range(min = 1))]
    pub tree_count: usize,

    /// Maximum tree depth
    #[serde(default = "default_max_depth")]
    #[validate(range(min = 1))]
    pub max_depth: usize,

    /// Features considered per split
    #[serde(default = "default_max_features")]
    #[validate(range(min = 1))]
    pub max_features: usize,

    /// Minimum rows needed to split a node
    #[serde(default = "default_min_samples_split")]
    #[validate(range(min = 2))]
    pub min_samples_split: usize,

    /// Minimum rows per leaf
    #[serde(default = "default_min_samples_leaf")]
    #[validate(range(min = 1))]
    pub min_samples_leaf: usize,

    /// Held-out corpus size for evaluation (0 disables evaluation)
    #[serde(default = "default_validation_samples")]
    pub validation_samples: usize,

    /// Where the fitted model is stored
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Write the artifact after training
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Reuse a compatible artifact instead of retraining
    #[serde(default = "default_true")]
    pub load_existing: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_samples: default_n_samples(),
            seed: default_seed(),
            noise_std: default_noise_std(),
            tree_count: default_tree_count(),
            max_depth: default_max_depth(),
            max_features: default_max_features(),
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            validation_samples: default_validation_samples(),
            artifact_path: default_artifact_path(),
            persist: true,
            load_existing: true,
        }
    }
}

impl ModelConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            tree_count: self.tree_count,
            max_depth: self.max_depth,
            max_features: self.max_features,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }

    pub fn fingerprint(&self) -> TrainingFingerprint {
        TrainingFingerprint {
            n_samples: self.n_samples,
            seed: self.seed,
            noise_std: self.noise_std,
            forest: self.forest_params(),
        }
    }

    fn check(&self) -> Result<()> {
        self.validate()?;
        if self.max_features > FEATURE_COUNT {
            return Err(AppError::Configuration(format!(
                "max_features must be at most {}",
                FEATURE_COUNT
            )));
        }
        if !self.noise_std.is_finite() {
            return Err(AppError::Configuration("noise_std must be finite".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_n_samples() -> usize {
    10000
}

fn default_seed() -> u64 {
    42
}

fn default_noise_std() -> f64 {
    5.0
}

fn default_tree_count() -> usize {
    100
}

fn default_max_depth() -> usize {
    15
}

fn default_max_features() -> usize {
    6
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_validation_samples() -> usize {
    2000
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("model/wildfire_model.bin")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "emberalert-ml".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_port(), 5001);
        assert_eq!(default_tree_count(), 100);
        assert_eq!(default_max_depth(), 15);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 5001);
        assert_eq!(config.model.n_samples, 10000);
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.observability.service_name, "emberalert-ml");
        assert_eq!(config.model.fingerprint(), ModelConfig::default().fingerprint());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides_defaults() {
        std::env::set_var("EMBERALERT_SERVER__PORT", "6000");
        std::env::set_var("EMBERALERT_MODEL__TREE_COUNT", "25");
        let loaded = Config::load();
        std::env::remove_var("EMBERALERT_SERVER__PORT");
        std::env::remove_var("EMBERALERT_MODEL__TREE_COUNT");

        let config = loaded.unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.model.tree_count, 25);
        assert_eq!(config.model.seed, 42);
    }

    #[test]
    fn test_invalid_model_rejected() {
        let mut config = Config::default();
        config.model.tree_count = 0;
        assert!(matches!(config.validate(), Err(AppError::Configuration(_))));

        let mut config = Config::default();
        config.model.max_features = 9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.noise_std = -1.0;
        assert!(config.validate().is_err());
    }
}
