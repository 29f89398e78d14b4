use anyhow::Context;
use emberalert_ml::{
    api::{build_router, AppState},
    config::Config,
    ml::{ModelSource, RiskModel},
    prediction::PredictionOrchestrator,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config);

    config.validate().context("Invalid configuration")?;

    let service = config.observability.service_name.as_str();
    tracing::info!(
        service,
        "Starting EmberAlert ML Service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        trees = config.model.tree_count,
        max_depth = config.model.max_depth,
        samples = config.model.n_samples,
        seed = config.model.seed,
        "Model configuration"
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = emberalert_ml::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("✅ Prometheus metrics initialized");
        }
    } else {
        tracing::info!("⚠️  Prometheus metrics disabled in configuration");
    }

    // Train (or load) before accepting traffic; failure aborts startup.
    let model_config = config.model.clone();
    let (model, source) = tokio::task::spawn_blocking(move || RiskModel::load_or_train(&model_config))
        .await
        .context("Model initialization task panicked")?
        .context("Model initialization failed")?;

    match source {
        ModelSource::Trained => tracing::info!("✅ Model trained"),
        ModelSource::Loaded => tracing::info!("✅ Model loaded from artifact"),
    }
    if let Some(metrics) = &model.metadata().validation_metrics {
        tracing::info!(
            r2 = format!("{:.4}", metrics.r2),
            rmse = format!("{:.3}", metrics.rmse),
            "Validation metrics"
        );
    }

    let orchestrator = Arc::new(PredictionOrchestrator::new(
        Arc::new(model),
        config.server.max_batch_size,
    ));
    let state =
        AppState::new(orchestrator).with_prometheus(config.observability.prometheus_enabled);
    let app = build_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;

    tracing::info!(service, "🚀 EmberAlert ML Service listening on http://{}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "emberalert_ml={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
