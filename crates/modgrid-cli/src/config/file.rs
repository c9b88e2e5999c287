use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileAnnealingConfig {
    #[serde(rename = "initial-temperature")]
    pub initial_temperature: Option<f64>,
    #[serde(rename = "cooling-rate")]
    pub cooling_rate: Option<f64>,
    #[serde(rename = "stopping-temperature")]
    pub stopping_temperature: Option<f64>,
    #[serde(rename = "iterations-per-temp")]
    pub iterations_per_temperature_step: Option<usize>,
    #[serde(rename = "initial-swap-probability")]
    pub initial_swap_probability: Option<f64>,
    #[serde(rename = "final-swap-probability")]
    pub final_swap_probability: Option<f64>,
    #[serde(rename = "start-from-current-grid")]
    pub start_from_current_grid: Option<bool>,
    #[serde(rename = "max-processing-time")]
    pub max_processing_time: Option<f64>,
    #[serde(rename = "max-steps-without-improvement")]
    pub max_steps_without_improvement: Option<usize>,
    #[serde(rename = "reheat-factor")]
    pub reheat_factor: Option<f64>,
    pub seed: Option<u64>,
    #[serde(rename = "max-iterations")]
    pub max_iterations: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileScoringConfig {
    #[serde(rename = "supercharge-multiplier")]
    pub supercharge_multiplier: Option<f64>,
    #[serde(rename = "cross-weight")]
    pub cross_weight: Option<f64>,
    #[serde(rename = "linear-weight")]
    pub linear_weight: Option<f64>,
    #[serde(rename = "lesser-weight")]
    pub lesser_weight: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileServerConfig {
    pub bind: Option<String>,
    #[serde(rename = "progress-interval-ms")]
    pub progress_interval_ms: Option<u64>,
    #[serde(rename = "progress-buffer")]
    pub progress_buffer: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(rename = "catalog-path")]
    pub catalog_path: Option<PathBuf>,
    pub annealing: Option<FileAnnealingConfig>,
    pub scoring: Option<FileScoringConfig>,
    pub server: Option<FileServerConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

        // A relative catalog path is relative to the file that names it.
        if let (Some(catalog), Some(dir)) = (&config.catalog_path, path.parent()) {
            if catalog.is_relative() {
                config.catalog_path = Some(dir.join(catalog));
            }
        }
        Ok(config)
    }
}
