// Core modules
pub mod config;
pub mod dataset;
pub mod exporter;
pub mod logging;
pub mod services;
pub mod state;
pub mod types;
pub mod web;

// Re-exports
pub use config::{ExporterConfig, StreamerConfig};
pub use dataset::{Dataset, DatasetLoader, RowSource};
pub use state::AppState;
