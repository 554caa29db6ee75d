//! One-shot conversion of a trained LightGBM model into an ONNX graph.
//!
//! The run reads the model, checks its input width against the configured
//! feature count, builds the graph and writes it. Every failure happens
//! before the output file is touched.

pub mod convert;
pub mod lightgbm;
pub mod onnx;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::config::ExporterConfig;
use convert::InputSpec;
use lightgbm::{LightGbmModel, ModelParseError, Objective};
use prost::Message;
use std::fs;
use std::path::PathBuf;

pub use convert::to_onnx;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to read model {path}: {source}")]
    ReadModel {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse model {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ModelParseError,
    },
    #[error("model expects {model} input features but {configured} were configured")]
    FeatureCountMismatch { model: usize, configured: usize },
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What a successful export produced.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub output_path: PathBuf,
    pub bytes_written: usize,
    pub trees: usize,
    pub objective: Objective,
    pub input: InputSpec,
}

pub fn export(config: &ExporterConfig) -> Result<ExportSummary, ExportError> {
    config.validate()?;

    tracing::info!("📦 Loading model from {}", config.model_path.display());
    let text = fs::read_to_string(&config.model_path).map_err(|source| ExportError::ReadModel {
        path: config.model_path.clone(),
        source,
    })?;
    let model = LightGbmModel::parse(&text).map_err(|source| ExportError::Parse {
        path: config.model_path.clone(),
        source,
    })?;
    tracing::info!(
        "Parsed LightGBM {} model: {} trees, objective {:?}, {} features",
        model.version,
        model.trees.len(),
        model.objective,
        model.feature_count()
    );

    if model.feature_count() != config.feature_count {
        return Err(ExportError::FeatureCountMismatch {
            model: model.feature_count(),
            configured: config.feature_count,
        });
    }

    let input = InputSpec {
        name: config.input_name.clone(),
        feature_count: config.feature_count,
    };
    let bytes = to_onnx(&model, &input).encode_to_vec();

    if let Some(parent) = config.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ExportError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&config.output_path, &bytes).map_err(|source| ExportError::Write {
        path: config.output_path.clone(),
        source,
    })?;
    tracing::info!("💾 Wrote {} bytes to {}", bytes.len(), config.output_path.display());

    Ok(ExportSummary {
        output_path: config.output_path.clone(),
        bytes_written: bytes.len(),
        trees: model.trees.len(),
        objective: model.objective,
        input,
    })
}
