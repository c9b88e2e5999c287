use thiserror::Error;

use super::config::ConfigError;
use crate::core::catalog::registry::CatalogError;
use crate::core::models::grid::GridError;
use crate::core::scoring::ScoringError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Grid error: {source}")]
    Grid {
        #[from]
        source: GridError,
    },

    #[error("Catalog error: {source}")]
    Catalog {
        #[from]
        source: CatalogError,
    },

    #[error("Scoring failed: {source}")]
    Scoring {
        #[from]
        source: ScoringError,
    },

    #[error("Invalid annealing parameters: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Optimization was cancelled")]
    Cancelled,

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for lookups of a ship or tech the catalog does not define.
    pub fn is_unknown_ship_or_tech(&self) -> bool {
        matches!(
            self,
            EngineError::Catalog {
                source: CatalogError::UnknownShip(_) | CatalogError::UnknownTech { .. }
            }
        )
    }

    /// True for errors caused by the request itself rather than by the engine.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedRequest(_)
                | EngineError::Grid { .. }
                | EngineError::Config { .. }
        ) || self.is_unknown_ship_or_tech()
    }
}
