// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_INPUT_FILE: &str = "test.csv";
pub const FALLBACK_INPUT_FILE: &str = "text.csv";
pub const DEFAULT_TEMPLATE: &str = "trade_no={}&version=1.0";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub io: IoConfig,
    pub signing: SigningConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IoConfig {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SigningConfig {
    pub key_path: PathBuf,
    pub template: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub flush_every: u64,
    #[serde(default)]
    pub preserve_order: bool,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CSV_SIGNER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            io: IoConfig {
                input: PathBuf::from(DEFAULT_INPUT_FILE),
                output: PathBuf::from("output.csv"),
            },
            signing: SigningConfig {
                key_path: PathBuf::from("private.pem"),
                template: DEFAULT_TEMPLATE.to_string(),
            },
            pipeline: PipelineConfig {
                workers: 4,
                queue_capacity: 1000,
                flush_every: 1000,
                preserve_order: false,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            return Err(PipelineError::Config(
                "workers must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(PipelineError::Config(
                "queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.flush_every == 0 {
            return Err(PipelineError::Config(
                "flush_every must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
