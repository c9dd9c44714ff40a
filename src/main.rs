//! Churn Prediction CLI
//!
//! Scores a single customer given as JSON, or every row of a CSV file,
//! with the first model candidate that loads.

use anyhow::{bail, Context, Result};
use churn_inference::{
    config::AppConfig,
    service::ChurnService,
    types::{
        prediction::{BatchPrediction, PredictionResult},
        record::{FieldValue, Table},
    },
};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Make churn predictions using trained models", long_about = None)]
struct Args {
    /// JSON object with a single customer's data; missing fields are zero-filled
    #[arg(short, long, conflicts_with_all = ["input", "info"])]
    single: Option<String>,

    /// Input CSV file with customer data
    #[arg(short, long, requires = "output")]
    input: Option<PathBuf>,

    /// Output CSV file for predictions
    #[arg(short, long, requires = "input")]
    output: Option<PathBuf>,

    /// Print information about the loaded model and exit
    #[arg(long)]
    info: bool,

    /// Model name to use instead of the configured candidates
    #[arg(short, long)]
    model: Option<String>,

    /// Directory containing model artifacts
    #[arg(long)]
    models_dir: Option<String>,

    /// Configuration file (default: config/config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    if let Some(dir) = &args.models_dir {
        config.models.models_dir = dir.clone();
    }
    if let Some(model) = &args.model {
        config.models.candidates = vec![model.clone()];
    }

    init_logging(&config)?;

    if args.single.is_none() && args.input.is_none() && !args.info {
        bail!("specify either --single, --info, or both --input and --output");
    }

    info!(
        models_dir = %config.models.models_dir,
        candidates = ?config.models.candidates,
        "Starting churn prediction"
    );
    let service = ChurnService::start(config);

    if args.info {
        println!("{}", serde_json::to_string_pretty(&service.model_info())?);
        println!("{}", serde_json::to_string_pretty(&service.health())?);
        return Ok(());
    }

    if let Some(json) = &args.single {
        let value: serde_json::Value =
            serde_json::from_str(json).context("Failed to parse customer JSON")?;
        let result = service.predict_json(&value)?;
        print_single(&result);
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if let (Some(input), Some(output)) = (&args.input, &args.output) {
        let batch = predict_csv(&service, input, output)?;
        print_summary(&batch);
        service.metrics().print_summary();
    }

    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

/// Score every row of `input` and write it back out with prediction columns appended.
fn predict_csv(service: &ChurnService, input: &Path, output: &Path) -> Result<BatchPrediction> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut raw_rows = Vec::new();
    for row in reader.records() {
        raw_rows.push(row?);
    }
    info!(path = %input.display(), rows = raw_rows.len(), "Loaded input data");

    let chunk_size = service.config().limits.max_batch_size;
    let mut results = Vec::with_capacity(raw_rows.len());
    for (chunk_idx, chunk) in raw_rows.chunks(chunk_size).enumerate() {
        let mut table = Table::new(headers.clone());
        for row in chunk {
            table.push_row(row.iter().map(FieldValue::parse_cell).collect());
        }
        let predictions = service.predict(&table.into()).with_context(|| {
            format!(
                "Prediction failed for rows starting at {}",
                chunk_idx * chunk_size
            )
        })?;
        results.extend(predictions);
    }

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut out_headers = headers.clone();
    out_headers.extend(
        [
            "prediction",
            "prediction_label",
            "churn_probability",
            "confidence",
            "risk_level",
        ]
        .map(String::from),
    );
    writer.write_record(&out_headers)?;

    for (row, result) in raw_rows.iter().zip(&results) {
        let mut fields: Vec<String> = row.iter().map(str::to_string).collect();
        fields.push(result.prediction.to_string());
        fields.push(result.prediction_label.as_str().to_string());
        fields.push(result.churn_probability.to_string());
        fields.push(result.confidence.to_string());
        fields.push(result.risk_level.to_string());
        writer.write_record(&fields)?;
    }
    writer.flush()?;

    info!(path = %output.display(), rows = results.len(), "Predictions saved");
    Ok(BatchPrediction::from_results(results))
}

fn print_single(result: &PredictionResult) {
    info!(
        prediction = result.prediction_label.as_str(),
        churn_probability = format!("{:.2}%", result.churn_probability * 100.0),
        confidence = format!("{:.2}%", result.confidence * 100.0),
        risk_level = %result.risk_level,
        "Prediction result"
    );
}

fn print_summary(batch: &BatchPrediction) {
    let non_churned = batch.total_customers - batch.churned_count;
    let non_churned_rate = if batch.total_customers > 0 {
        1.0 - batch.churn_rate
    } else {
        0.0
    };
    info!("═══════════════════════ PREDICTION SUMMARY ═══════════════════════");
    info!("Total samples:          {}", batch.total_customers);
    info!(
        "Predicted churners:     {} ({:.1}%)",
        batch.churned_count,
        batch.churn_rate * 100.0
    );
    info!(
        "Predicted non-churners: {} ({:.1}%)",
        non_churned,
        non_churned_rate * 100.0
    );
    info!("Risk Level Distribution:");
    for (level, count) in batch.risk_distribution() {
        info!("  {:10} {:>6}", level.as_str(), count);
    }
}
