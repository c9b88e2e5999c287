use super::layout::ShipLayout;
use crate::core::models::module::Module;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const BUILTIN_CATALOG: &str = include_str!("../../../data/catalog.toml");
const BUILTIN_ORIGIN: &str = "<builtin>";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid layout for ship '{ship}': {reason}")]
    InvalidLayout { ship: String, reason: String },
    #[error("Invalid module '{module}' in tech '{tech}' of ship '{ship}': {reason}")]
    InvalidModule {
        ship: String,
        tech: String,
        module: String,
        reason: String,
    },
    #[error("Unknown ship '{0}'")]
    UnknownShip(String),
    #[error("Unknown tech '{tech}' for ship '{ship}'")]
    UnknownTech { ship: String, tech: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    #[serde(default)]
    ships: BTreeMap<String, RawShip>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawShip {
    label: Option<String>,
    layout: Vec<String>,
    #[serde(default)]
    types: BTreeMap<String, Vec<RawTech>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTech {
    key: String,
    label: Option<String>,
    #[serde(default)]
    modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TechDefinition {
    pub key: String,
    pub label: String,
    pub category: String,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShipDefinition {
    pub key: String,
    pub label: String,
    pub layout: ShipLayout,
    /// Technology categories (e.g. "weaponry") in key order, each with its techs in file order.
    pub categories: BTreeMap<String, Vec<TechDefinition>>,
}

impl ShipDefinition {
    pub fn techs(&self) -> impl Iterator<Item = &TechDefinition> {
        self.categories.values().flatten()
    }

    pub fn tech(&self, key: &str) -> Option<&TechDefinition> {
        self.techs().find(|t| t.key == key)
    }
}

/// Read-only ship and technology definitions.
///
/// Loaded once and then shared freely between jobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    ships: BTreeMap<String, ShipDefinition>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content, &path.to_string_lossy())
    }

    /// The catalog compiled into the library.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG, BUILTIN_ORIGIN)
    }

    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(content).map_err(|e| CatalogError::Toml {
            path: origin.to_string(),
            source: e,
        })?;

        let mut ships = BTreeMap::new();
        for (ship_key, raw_ship) in raw.ships {
            let layout = ShipLayout::parse(&ship_key, &raw_ship.layout)?;
            let mut categories = BTreeMap::new();
            for (category, raw_techs) in raw_ship.types {
                let mut techs = Vec::with_capacity(raw_techs.len());
                for raw_tech in raw_techs {
                    techs.push(Self::build_tech(&ship_key, &category, raw_tech)?);
                }
                categories.insert(category, techs);
            }

            debug!(
                ship = %ship_key,
                categories = categories.len(),
                "Loaded ship definition."
            );
            ships.insert(
                ship_key.clone(),
                ShipDefinition {
                    label: raw_ship.label.unwrap_or_else(|| ship_key.clone()),
                    key: ship_key,
                    layout,
                    categories,
                },
            );
        }

        Ok(Self { ships })
    }

    fn build_tech(
        ship: &str,
        category: &str,
        raw: RawTech,
    ) -> Result<TechDefinition, CatalogError> {
        let invalid = |module: &str, reason: &str| CatalogError::InvalidModule {
            ship: ship.to_string(),
            tech: raw.key.clone(),
            module: module.to_string(),
            reason: reason.to_string(),
        };

        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(raw.modules.len());
        for mut module in raw.modules.iter().cloned() {
            if !seen.insert(module.id.clone()) {
                return Err(invalid(&module.id, "duplicate module id"));
            }
            if !module.bonus.is_finite() {
                return Err(invalid(&module.id, "bonus must be a finite number"));
            }
            if module.count == 0 {
                return Err(invalid(&module.id, "count must be at least 1"));
            }
            module.tech = raw.key.clone();
            modules.push(module);
        }

        Ok(TechDefinition {
            label: raw.label.clone().unwrap_or_else(|| raw.key.clone()),
            key: raw.key.clone(),
            category: category.to_string(),
            modules,
        })
    }

    pub fn ships(&self) -> impl Iterator<Item = &ShipDefinition> {
        self.ships.values()
    }

    pub fn ship(&self, key: &str) -> Result<&ShipDefinition, CatalogError> {
        self.ships
            .get(key)
            .ok_or_else(|| CatalogError::UnknownShip(key.to_string()))
    }

    pub fn tech(&self, ship: &str, tech: &str) -> Result<&TechDefinition, CatalogError> {
        self.ship(ship)?
            .tech(tech)
            .ok_or_else(|| CatalogError::UnknownTech {
                ship: ship.to_string(),
                tech: tech.to_string(),
            })
    }

    /// Every module of a ship, flattened across categories and techs.
    pub fn all_modules(&self, ship: &str) -> Result<Vec<Module>, CatalogError> {
        Ok(self
            .ship(ship)?
            .techs()
            .flat_map(|t| t.modules.iter().cloned())
            .collect())
    }

    /// The multiset of modules an optimization of `tech` must place.
    ///
    /// Modules with `count > 1` appear that many times. Reward modules are only
    /// included when their id is listed in `owned_rewards`.
    pub fn candidate_modules(
        &self,
        ship: &str,
        tech: &str,
        owned_rewards: &[String],
    ) -> Result<Vec<Module>, CatalogError> {
        let definition = self.tech(ship, tech)?;
        let mut candidates = Vec::new();
        for module in &definition.modules {
            if module.reward && !owned_rewards.iter().any(|r| r == &module.id) {
                continue;
            }
            for _ in 0..module.count {
                candidates.push(module.clone());
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[ships.scout]
label = "Scout"
layout = ["So", "oo"]

[[ships.scout.types.weaponry]]
key = "laser"
label = "Laser"
modules = [
    { id = "LC", label = "Laser Core", type = "core", bonus = 1.0, adjacency = "cross", sc_eligible = true },
    { id = "LU", label = "Laser Upgrade", type = "bonus", bonus = 0.5, adjacency = "lesser", count = 2 },
    { id = "LR", label = "Laser Relic", type = "reward", bonus = 0.8, reward = true },
]

[[ships.scout.types.mobility]]
key = "drive"
modules = []
"#;

    #[test]
    fn loads_ships_and_stamps_tech_keys() {
        let catalog = Catalog::from_toml_str(SAMPLE, "sample").unwrap();
        let ship = catalog.ship("scout").unwrap();
        assert_eq!(ship.label, "Scout");
        assert_eq!(ship.layout.width(), 2);

        let laser = catalog.tech("scout", "laser").unwrap();
        assert_eq!(laser.category, "weaponry");
        assert!(laser.modules.iter().all(|m| m.tech == "laser"));
        assert_eq!(catalog.all_modules("scout").unwrap().len(), 3);
    }

    #[test]
    fn candidates_expand_counts_and_filter_rewards() {
        let catalog = Catalog::from_toml_str(SAMPLE, "sample").unwrap();
        let ids = |mods: Vec<Module>| mods.into_iter().map(|m| m.id).collect::<Vec<_>>();

        let without_reward = catalog.candidate_modules("scout", "laser", &[]).unwrap();
        assert_eq!(ids(without_reward), vec!["LC", "LU", "LU"]);

        let with_reward = catalog
            .candidate_modules("scout", "laser", &["LR".to_string()])
            .unwrap();
        assert_eq!(ids(with_reward), vec!["LC", "LU", "LU", "LR"]);
    }

    #[test]
    fn unknown_lookups_fail() {
        let catalog = Catalog::from_toml_str(SAMPLE, "sample").unwrap();
        assert!(matches!(
            catalog.ship("hauler"),
            Err(CatalogError::UnknownShip(s)) if s == "hauler"
        ));
        assert!(matches!(
            catalog.tech("scout", "shield"),
            Err(CatalogError::UnknownTech { .. })
        ));
    }

    #[test]
    fn duplicate_module_ids_are_rejected() {
        let content = r#"
[ships.scout]
layout = ["o"]
[[ships.scout.types.weaponry]]
key = "laser"
modules = [{ id = "LC", bonus = 1.0 }, { id = "LC", bonus = 2.0 }]
"#;
        let result = Catalog::from_toml_str(content, "dup");
        assert!(matches!(result, Err(CatalogError::InvalidModule { .. })));
    }

    #[test]
    fn load_reads_file_and_reports_io_errors() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();
        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.ships().count(), 1);

        let missing = Catalog::load(Path::new("/nonexistent/catalog.toml"));
        assert!(matches!(missing, Err(CatalogError::Io { .. })));
    }

    #[test]
    fn builtin_catalog_parses() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.tech("sentinel", "infra").is_ok());
        assert!(catalog.tech("exosuit", "jetpack").is_ok());
    }
}
