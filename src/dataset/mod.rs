//! In-memory sensor dataset.
//!
//! The table is loaded once at startup and never mutated afterwards; every
//! stream connection reads it through a shared `Arc`.

mod loader;
pub mod value;

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

pub use loader::DatasetLoader;

/// One record: column name to scalar, in header order.
pub type Row = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset has no header row")]
    MissingHeader,
}

/// Anything a stream can replay rows from.
pub trait RowSource: Send + Sync + 'static {
    fn len(&self) -> usize;

    fn row(&self, index: usize) -> Option<&Row>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl RowSource for Dataset {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }
}

impl RowSource for Vec<Row> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn row(&self, index: usize) -> Option<&Row> {
        self.get(index)
    }
}
