//! LightGBM to ONNX exporter
//!
//! Reads a LightGBM text model, converts it into an ONNX tree-ensemble
//! graph with a `float[N, F]` input and writes the serialized bytes.

use anyhow::{Context, Result};
use clap::Parser;
use pdm_data_api::{config::ExporterConfig, exporter, logging};

fn main() -> Result<()> {
    logging::init();

    let config = ExporterConfig::parse();
    let summary = exporter::export(&config)
        .with_context(|| format!("failed to export {}", config.model_path.display()))?;

    tracing::info!(
        "{} trees, input '{}' [N, {}]",
        summary.trees,
        summary.input.name,
        summary.input.feature_count
    );
    println!(
        "✅ Model converted to ONNX format: {} ({} bytes)",
        summary.output_path.display(),
        summary.bytes_written
    );
    Ok(())
}
