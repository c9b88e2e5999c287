use crate::core::models::grid::Grid;
use crate::core::models::module::AdjacencyKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Module '{module_id}' at ({x}, {y}) has a non-finite bonus ({bonus})")]
    NonFiniteBonus {
        module_id: String,
        x: usize,
        y: usize,
        bonus: f64,
    },
    #[error("Invalid scoring parameter '{parameter}': {value}")]
    InvalidParameter { parameter: &'static str, value: f64 },
}

/// Tunable constants of the adjacency model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    /// Factor applied to the total of an `sc_eligible` module on a supercharged slot.
    pub supercharge_multiplier: f64,
    pub cross_weight: f64,
    pub linear_weight: f64,
    pub lesser_weight: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            supercharge_multiplier: 1.25,
            cross_weight: 0.1,
            linear_weight: 0.1,
            lesser_weight: 0.05,
        }
    }
}

impl ScoringParams {
    pub fn weight(&self, kind: AdjacencyKind) -> f64 {
        match kind {
            AdjacencyKind::None => 0.0,
            AdjacencyKind::Cross => self.cross_weight,
            AdjacencyKind::Linear => self.linear_weight,
            AdjacencyKind::Lesser => self.lesser_weight,
        }
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        let checks = [
            ("supercharge_multiplier", self.supercharge_multiplier),
            ("cross_weight", self.cross_weight),
            ("linear_weight", self.linear_weight),
            ("lesser_weight", self.lesser_weight),
        ];
        for (parameter, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::InvalidParameter { parameter, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CellScore {
    pub adjacency_bonus: f64,
    pub total: f64,
}

/// Computes grid scores as a pure function of occupancy.
///
/// Accumulation always runs in row-major order, and neighbours are visited in the
/// fixed order of [`AdjacencyKind::offsets`]. Two evaluations of the same grid
/// therefore produce bit-identical results.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    params: &'a ScoringParams,
}

impl<'a> Scorer<'a> {
    pub fn new(params: &'a ScoringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScoringParams {
        self.params
    }

    /// Scores the grid and writes `adjacency_bonus`/`total` annotations into every cell.
    pub fn score(&self, grid: &mut Grid) -> Result<f64, ScoringError> {
        let mut sum = 0.0;
        for index in 0..grid.len() {
            let cell_score = self.score_cell(grid, index)?;
            let cell = grid.cell_at_mut(index);
            cell.adjacency_bonus = cell_score.adjacency_bonus;
            cell.total = cell_score.total;
            sum += cell_score.total;
        }
        Ok(sum)
    }

    /// Same score as [`Scorer::score`], without touching the grid.
    pub fn evaluate(&self, grid: &Grid) -> Result<f64, ScoringError> {
        let mut sum = 0.0;
        for index in 0..grid.len() {
            sum += self.score_cell(grid, index)?.total;
        }
        Ok(sum)
    }

    /// Sum of the totals of cells holding modules of `tech`.
    pub fn evaluate_tech(&self, grid: &Grid, tech: &str) -> Result<f64, ScoringError> {
        let mut sum = 0.0;
        for index in 0..grid.len() {
            if grid.cell_at(index).tech() == Some(tech) {
                sum += self.score_cell(grid, index)?.total;
            }
        }
        Ok(sum)
    }

    pub fn score_cell(&self, grid: &Grid, index: usize) -> Result<CellScore, ScoringError> {
        let cell = grid.cell_at(index);
        let Some(occupant) = cell.occupant.as_ref().filter(|_| cell.active) else {
            return Ok(CellScore::default());
        };

        if !occupant.bonus.is_finite() {
            let (x, y) = grid.coords_of(index);
            return Err(ScoringError::NonFiniteBonus {
                module_id: occupant.module_id.clone(),
                x,
                y,
                bonus: occupant.bonus,
            });
        }

        let weight = self.params.weight(occupant.adjacency);
        let mut adjacency_bonus = 0.0;
        for &(dx, dy) in occupant.adjacency.offsets() {
            let Some(neighbor_index) = grid.neighbor_index(index, dx, dy) else {
                continue;
            };
            let neighbor = grid.cell_at(neighbor_index);
            if !neighbor.active {
                continue;
            }
            if let Some(other) = &neighbor.occupant {
                if other.tech == occupant.tech {
                    adjacency_bonus += weight * other.bonus;
                }
            }
        }

        let mut total = occupant.bonus + adjacency_bonus;
        if cell.supercharged && occupant.sc_eligible {
            total *= self.params.supercharge_multiplier;
        }

        Ok(CellScore {
            adjacency_bonus,
            total,
        })
    }
}
