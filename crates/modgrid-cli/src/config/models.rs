use crate::error::Result;
use modgrid::core::catalog::registry::Catalog;
use modgrid::core::scoring::ScoringParams;
use modgrid::engine::config::AnnealingParams;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: String,
    /// Capacity of each job's progress channel. Snapshots beyond it are dropped.
    pub progress_buffer: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub catalog_path: Option<PathBuf>,
    pub annealing: AnnealingParams,
    pub scoring: ScoringParams,
    pub server: ServerSettings,
}

impl AppConfig {
    pub fn load_catalog(&self) -> Result<Catalog> {
        load_catalog(self.catalog_path.as_deref())
    }
}

pub fn load_catalog(path: Option<&std::path::Path>) -> Result<Catalog> {
    let catalog = match path {
        Some(path) => {
            info!("Loading module catalog from {:?}", path);
            Catalog::load(path).map_err(modgrid::engine::error::EngineError::from)?
        }
        None => Catalog::builtin().map_err(modgrid::engine::error::EngineError::from)?,
    };
    Ok(catalog)
}
