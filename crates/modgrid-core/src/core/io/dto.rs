use crate::core::models::grid::{Grid, GridError, Occupant};
use crate::core::models::module::AdjacencyKind;
use serde::{Deserialize, Serialize};

/// Wire form of a single cell. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellDto {
    pub active: bool,
    pub supercharged: bool,
    #[serde(alias = "module_id")]
    pub module: Option<String>,
    pub label: Option<String>,
    pub tech: Option<String>,
    #[serde(rename = "type")]
    pub module_type: String,
    pub bonus: f64,
    pub adjacency: AdjacencyKind,
    pub adjacency_bonus: f64,
    pub total: f64,
    pub sc_eligible: bool,
    pub image: Option<String>,
    pub value: f64,
}

/// Wire form of a grid: rows of cells, outer index `y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDto {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Vec<CellDto>>,
}

impl From<&Grid> for GridDto {
    fn from(grid: &Grid) -> Self {
        let cells = (0..grid.height())
            .map(|y| {
                (0..grid.width())
                    .map(|x| {
                        let cell = &grid.cells()[y * grid.width() + x];
                        let mut dto = CellDto {
                            active: cell.active,
                            supercharged: cell.supercharged,
                            adjacency_bonus: cell.adjacency_bonus,
                            total: cell.total,
                            value: cell.value,
                            ..CellDto::default()
                        };
                        if let Some(occupant) = &cell.occupant {
                            dto.module = Some(occupant.module_id.clone());
                            dto.label = Some(occupant.label.clone());
                            dto.tech = Some(occupant.tech.clone());
                            dto.module_type = occupant.module_type.clone();
                            dto.bonus = occupant.bonus;
                            dto.adjacency = occupant.adjacency;
                            dto.sc_eligible = occupant.sc_eligible;
                            dto.image = Some(occupant.image.clone());
                        }
                        dto
                    })
                    .collect()
            })
            .collect();

        Self {
            width: grid.width(),
            height: grid.height(),
            cells,
        }
    }
}

impl TryFrom<&GridDto> for Grid {
    type Error = GridError;

    fn try_from(dto: &GridDto) -> Result<Self, Self::Error> {
        if dto.cells.len() != dto.height {
            return Err(GridError::ShapeMismatch(format!(
                "expected {} rows, found {}",
                dto.height,
                dto.cells.len()
            )));
        }

        if let Some((y, row)) = dto
            .cells
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != dto.width)
        {
            return Err(GridError::ShapeMismatch(format!(
                "row {} has {} cells, expected {}",
                y,
                row.len(),
                dto.width
            )));
        }

        let mut grid = Grid::new(dto.width, dto.height)?;
        for (y, row) in dto.cells.iter().enumerate() {
            for (x, cell_dto) in row.iter().enumerate() {
                grid.set_active(x, y, cell_dto.active)?;
                grid.set_supercharged(x, y, cell_dto.supercharged)?;
                let index = grid.index_of(x, y)?;
                if let Some(module_id) = &cell_dto.module {
                    grid.place_at(
                        index,
                        Occupant {
                            module_id: module_id.clone(),
                            label: cell_dto.label.clone().unwrap_or_default(),
                            tech: cell_dto.tech.clone().unwrap_or_default(),
                            module_type: cell_dto.module_type.clone(),
                            bonus: cell_dto.bonus,
                            adjacency: cell_dto.adjacency,
                            sc_eligible: cell_dto.sc_eligible,
                            image: cell_dto.image.clone().unwrap_or_default(),
                        },
                    )?;
                }
                let cell = grid.cell_at_mut(index);
                cell.adjacency_bonus = cell_dto.adjacency_bonus;
                cell.total = cell_dto.total;
                cell.value = cell_dto.value;
            }
        }

        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::module::Module;
    use crate::core::scoring::{Scorer, ScoringParams};

    fn sample_grid() -> Grid {
        let mut grid = Grid::new(3, 2).unwrap();
        for (x, y) in [(0, 0), (1, 0), (2, 0), (0, 1), (1, 1)] {
            grid.set_active(x, y, true).unwrap();
        }
        grid.set_supercharged(1, 0, true).unwrap();
        let core = Module::new("IK", "infra", 1.0)
            .with_adjacency(AdjacencyKind::Cross)
            .with_sc_eligible(true);
        grid.place_module(1, 0, &core).unwrap();
        let xa = Module::new("Xa", "infra", 0.4);
        grid.place_module(1, 1, &xa).unwrap();
        let params = ScoringParams::default();
        Scorer::new(&params).score(&mut grid).unwrap();
        grid
    }

    #[test]
    fn grid_survives_json_round_trip() {
        let grid = sample_grid();
        let json = serde_json::to_string(&GridDto::from(&grid)).unwrap();
        let parsed: GridDto = serde_json::from_str(&json).unwrap();
        let restored = Grid::try_from(&parsed).unwrap();
        assert_eq!(restored, grid);
    }

    #[test]
    fn serialization_is_row_major_and_stable() {
        let grid = sample_grid();
        let first = serde_json::to_string(&GridDto::from(&grid)).unwrap();
        let second = serde_json::to_string(&GridDto::from(&grid.clone())).unwrap();
        assert_eq!(first, second);

        let dto = GridDto::from(&grid);
        assert_eq!(dto.cells.len(), 2);
        assert_eq!(dto.cells[0][1].module.as_deref(), Some("IK"));
        assert_eq!(dto.cells[1][1].module.as_deref(), Some("Xa"));
    }

    #[test]
    fn parses_client_cell_shape() {
        let json = r#"{
            "width": 1, "height": 1,
            "cells": [[{
                "module": null, "label": null, "value": 0, "type": "",
                "total": 0.0, "adjacency_bonus": 0.0, "bonus": 0.0,
                "active": true, "adjacency": false, "tech": null,
                "supercharged": true, "sc_eligible": false, "image": null
            }]]
        }"#;
        let dto: GridDto = serde_json::from_str(json).unwrap();
        let grid = Grid::try_from(&dto).unwrap();
        let cell = grid.cell(0, 0).unwrap();
        assert!(cell.active && cell.supercharged && !cell.is_occupied());
    }

    #[test]
    fn module_id_is_accepted_for_module() {
        let json = r#"{
            "width": 2, "height": 1,
            "cells": [[
                {"active": true, "supercharged": false, "module_id": "IK",
                 "tech": "infra", "x": 0, "y": 0, "adjacency": "greater", "bonus": 1.0},
                {"active": true, "supercharged": false, "module_id": null,
                 "tech": null, "x": 1, "y": 0, "adjacency": null}
            ]]
        }"#;
        let dto: GridDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.cells[0][0].module.as_deref(), Some("IK"));
        assert_eq!(dto.cells[0][0].adjacency, AdjacencyKind::Cross);
        assert_eq!(dto.cells[0][1].module, None);

        let grid = Grid::try_from(&dto).unwrap();
        assert_eq!(grid.cell(0, 0).unwrap().module_id(), Some("IK"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dto = GridDto {
            width: 2,
            height: 1,
            cells: vec![vec![CellDto::default()]],
        };
        assert!(matches!(
            Grid::try_from(&dto),
            Err(GridError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn declared_shape_must_match_rows_before_allocating() {
        let huge = 1usize << 32;
        let dto = GridDto {
            width: huge,
            height: huge,
            cells: vec![],
        };
        assert!(matches!(
            Grid::try_from(&dto),
            Err(GridError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn module_on_inactive_cell_is_rejected() {
        let dto = GridDto {
            width: 1,
            height: 1,
            cells: vec![vec![CellDto {
                active: false,
                module: Some("IK".into()),
                ..CellDto::default()
            }]],
        };
        assert_eq!(
            Grid::try_from(&dto),
            Err(GridError::InvalidPlacement { x: 0, y: 0 })
        );
    }
}
