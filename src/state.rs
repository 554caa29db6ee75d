use crate::config::StreamerConfig;
use crate::dataset::{DatasetError, DatasetLoader, RowSource};
use crate::services::ReplayProducer;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<StreamerConfig>,
    pub dataset: Arc<dyn RowSource>,  // loaded once, read by every connection
    pub replay: ReplayProducer,
}

impl AppState {
    pub fn new(config: StreamerConfig, dataset: Arc<dyn RowSource>) -> Self {
        let replay = ReplayProducer::new(dataset.clone(), config.interval());
        Self {
            config: Arc::new(config),
            dataset,
            replay,
        }
    }

    /// Load the dataset named by the config. Fails before anything is served.
    pub fn load(config: StreamerConfig) -> Result<Self, DatasetError> {
        tracing::info!("[STATE] Initializing AppState...");
        tracing::info!("[STATE]   Dataset path: {}", config.dataset_path.display());
        tracing::info!("[STATE]   Interval: {:?}", config.interval());

        let dataset = DatasetLoader::load(&config.dataset_path)?;
        Ok(Self::new(config, dataset.into_shared()))
    }
}
