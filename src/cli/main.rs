use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "emberalert-cli")]
#[command(about = "EmberAlert ML service client", long_about = None)]
struct Cli {
    #[arg(short, long, env = "EMBERALERT_ENDPOINT", default_value = "http://localhost:5001")]
    endpoint: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Show model information
    Info,

    /// Score a single location
    Predict {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Score every location in a JSON file (`[{...}, ...]` or `{"locations": [...]}`)
    Batch {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Send repeated predictions and report latency
    Bench {
        #[arg(short, long, default_value = "10")]
        requests: usize,

        /// Average latency target in milliseconds
        #[arg(long, default_value = "200")]
        target_ms: f64,

        #[command(flatten)]
        location: LocationArgs,
    },
}

#[derive(clap::Args, Clone)]
struct LocationArgs {
    #[arg(long, default_value = "34.0522", allow_hyphen_values = true)]
    latitude: f64,

    #[arg(long, default_value = "-118.2437", allow_hyphen_values = true)]
    longitude: f64,

    #[arg(short, long, default_value = "35")]
    temperature: f64,

    #[arg(short = 'H', long, default_value = "25")]
    humidity: f64,

    #[arg(short, long, default_value = "15")]
    wind_speed: f64,

    #[arg(short, long, default_value = "60")]
    vegetation_density: f64,

    #[arg(long)]
    slope: Option<f64>,

    #[arg(long)]
    elevation: Option<f64>,

    #[arg(long)]
    days_since_rain: Option<f64>,

    #[arg(long)]
    proximity_to_water: Option<f64>,
}

impl LocationArgs {
    /// Request body; unset optional features are left to server defaults.
    fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("latitude".into(), json!(self.latitude));
        body.insert("longitude".into(), json!(self.longitude));
        body.insert("temperature".into(), json!(self.temperature));
        body.insert("humidity".into(), json!(self.humidity));
        body.insert("wind_speed".into(), json!(self.wind_speed));
        body.insert("vegetation_density".into(), json!(self.vegetation_density));

        let optional = [
            ("slope", self.slope),
            ("elevation", self.elevation),
            ("days_since_rain", self.days_since_rain),
            ("proximity_to_water", self.proximity_to_water),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                body.insert(name.into(), json!(value));
            }
        }

        Value::Object(body)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;
    let endpoint = cli.endpoint.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let body = get_json(&client, &format!("{}/health", endpoint)).await?;
            print_json(&body)?;
        }

        Commands::Info => {
            let body = get_json(&client, &format!("{}/model/info", endpoint)).await?;
            print_json(&body)?;
        }

        Commands::Predict { location } => {
            let body = post_json(&client, &format!("{}/predict", endpoint), &location.to_body())
                .await?;
            print_json(&body)?;
        }

        Commands::Batch { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let parsed: Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            let request = match parsed {
                Value::Array(locations) => json!({ "locations": locations }),
                other @ Value::Object(_) => other,
                _ => bail!("{} must hold a list or an object with 'locations'", file.display()),
            };

            let body =
                post_json(&client, &format!("{}/batch_predict", endpoint), &request).await?;
            print_json(&body)?;
        }

        Commands::Bench {
            requests,
            target_ms,
            location,
        } => {
            let url = format!("{}/predict", endpoint);
            let request = location.to_body();
            let mut total = Duration::ZERO;
            let mut successful = 0usize;

            for i in 0..requests {
                let start = Instant::now();
                match client.post(&url).json(&request).send().await {
                    Ok(response) if response.status().is_success() => {
                        total += start.elapsed();
                        successful += 1;
                    }
                    Ok(response) => println!("Request {} failed: {}", i + 1, response.status()),
                    Err(e) => println!("Request {} failed: {}", i + 1, e),
                }
            }

            if successful == 0 {
                bail!("All {} requests failed", requests);
            }

            let avg_ms = total.as_secs_f64() * 1000.0 / successful as f64;
            println!("Average response time: {:.2}ms", avg_ms);
            println!(
                "Target: < {:.0}ms {}",
                target_ms,
                if avg_ms < target_ms { "✅" } else { "❌" }
            );
            println!("Success rate: {}/{}", successful, requests);
        }
    }

    Ok(())
}

async fn get_json(client: &Client, url: &str) -> anyhow::Result<Value> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Could not reach {}", url))?;
    read_body(response).await
}

async fn post_json(client: &Client, url: &str, body: &Value) -> anyhow::Result<Value> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("Could not reach {}", url))?;
    read_body(response).await
}

async fn read_body(response: reqwest::Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.context("Response was not JSON")?;
    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        bail!("Server returned {}: {}", status, message);
    }
    Ok(body)
}

fn print_json(body: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}
