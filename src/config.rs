use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATASET_PATH: &str = "dataset/RealTime_IoT_PredictiveMaintenance_Dataset.csv";
pub const DEFAULT_STREAM_INTERVAL_SECS: f64 = 60.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    // Server configuration
    pub host: String,
    pub port: u16,

    // Dataset
    pub dataset_path: PathBuf,

    // Pacing
    pub interval_secs: f64,
    pub keep_alive_secs: u64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            interval_secs: DEFAULT_STREAM_INTERVAL_SECS,
            keep_alive_secs: 0,
        }
    }
}

impl StreamerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup, then validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: match lookup("PORT") {
                Some(raw) => parse_setting("PORT", &raw)?,
                None => defaults.port,
            },
            dataset_path: lookup("DATASET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.dataset_path),
            interval_secs: match lookup("STREAM_INTERVAL_SECS") {
                Some(raw) => parse_setting("STREAM_INTERVAL_SECS", &raw)?,
                None => defaults.interval_secs,
            },
            keep_alive_secs: match lookup("STREAM_KEEP_ALIVE_SECS") {
                Some(raw) => parse_setting("STREAM_KEEP_ALIVE_SECS", &raw)?,
                None => defaults.keep_alive_secs,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataset_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty("DATASET_PATH"));
        }
        if !self.interval_secs.is_finite() || self.interval_secs < 0.0 {
            return Err(ConfigError::Invalid {
                key: "STREAM_INTERVAL_SECS",
                value: self.interval_secs.to_string(),
                reason: "expected a finite, non-negative number of seconds".to_string(),
            });
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "HOST",
            value: self.host.clone(),
            reason: e.to_string(),
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        (self.keep_alive_secs > 0).then(|| Duration::from_secs(self.keep_alive_secs))
    }
}

/// Model exporter settings. Flags win over environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, clap::Parser)]
#[command(
    name = "pdm-export-onnx",
    version,
    about = "Convert a LightGBM text model into an ONNX inference graph"
)]
pub struct ExporterConfig {
    /// LightGBM model file written by `Booster.save_model`
    #[arg(long = "model", env = "MODEL_PATH", default_value = "best_models/Tuning_LightGBM.txt")]
    pub model_path: PathBuf,

    /// Destination of the serialized ONNX graph
    #[arg(long = "output", env = "ONNX_OUTPUT_PATH", default_value = "onnx_models/LightGBM_Tmodel.onnx")]
    pub output_path: PathBuf,

    /// Width of the float input tensor; must match the model
    #[arg(long = "features", env = "FEATURE_COUNT", default_value_t = 93)]
    pub feature_count: usize,

    /// Name of the graph input
    #[arg(long = "input-name", env = "ONNX_INPUT_NAME", default_value = "float_input")]
    pub input_name: String,
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feature_count == 0 {
            return Err(ConfigError::Invalid {
                key: "FEATURE_COUNT",
                value: "0".to_string(),
                reason: "the input needs at least one feature".to_string(),
            });
        }
        if self.input_name.trim().is_empty() {
            return Err(ConfigError::Empty("ONNX_INPUT_NAME"));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty("MODEL_PATH"));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty("ONNX_OUTPUT_PATH"));
        }
        Ok(())
    }
}

fn parse_setting<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
