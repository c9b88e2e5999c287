use super::module::{AdjacencyKind, Module};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("Cannot place a module on inactive cell ({x}, {y})")]
    InvalidPlacement { x: usize, y: usize },

    #[error("Coordinate ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("Grid dimensions must be between 1 and 256 per side, got {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Grid shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// The module currently occupying a cell, denormalized from the catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Occupant {
    pub module_id: String,
    pub label: String,
    pub tech: String,
    pub module_type: String,
    pub bonus: f64,
    pub adjacency: AdjacencyKind,
    pub sc_eligible: bool,
    pub image: String,
}

impl From<&Module> for Occupant {
    fn from(module: &Module) -> Self {
        Self {
            module_id: module.id.clone(),
            label: module.label.clone(),
            tech: module.tech.clone(),
            module_type: module.module_type.clone(),
            bonus: module.bonus,
            adjacency: module.adjacency,
            sc_eligible: module.sc_eligible,
            image: module.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub active: bool,
    pub supercharged: bool,
    pub occupant: Option<Occupant>,
    /// Written by the scorer.
    pub adjacency_bonus: f64,
    /// Written by the scorer.
    pub total: f64,
    /// Opaque client value, carried through untouched.
    pub value: f64,
}

impl Cell {
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    pub fn module_id(&self) -> Option<&str> {
        self.occupant.as_ref().map(|o| o.module_id.as_str())
    }

    pub fn tech(&self) -> Option<&str> {
        self.occupant.as_ref().map(|o| o.tech.as_str())
    }

    fn reset_scores(&mut self) {
        self.adjacency_bonus = 0.0;
        self.total = 0.0;
    }
}

/// Largest accepted width or height.
pub const MAX_SIDE: usize = 256;

/// A fixed-shape, row-major lattice of cells.
///
/// The shape never changes after construction; only cell contents mutate. An
/// occupant can only ever sit on an active cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Result<Self, GridError> {
        let len = width
            .checked_mul(height)
            .filter(|&len| len > 0 && width <= MAX_SIDE && height <= MAX_SIDE)
            .ok_or(GridError::InvalidDimensions { width, height })?;
        Ok(Self {
            width,
            height,
            cells: vec![Cell::default(); len],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn index_of(&self, x: usize, y: usize) -> Result<usize, GridError> {
        if x >= self.width || y >= self.height {
            return Err(GridError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y * self.width + x)
    }

    pub fn coords_of(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.index_of(x, y).ok().map(|i| &self.cells[i])
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        match self.index_of(x, y) {
            Ok(i) => Some(&mut self.cells[i]),
            Err(_) => None,
        }
    }

    pub fn cell_at(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub(crate) fn cell_at_mut(&mut self, index: usize) -> &mut Cell {
        &mut self.cells[index]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cells in row-major order together with their `(x, y)` coordinates.
    pub fn cells_iter(&self) -> impl Iterator<Item = ((usize, usize), &Cell)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| ((i % width, i / width), cell))
    }

    /// Index of the neighbour at offset `(dx, dy)`, if it lies inside the grid.
    pub fn neighbor_index(&self, index: usize, dx: isize, dy: isize) -> Option<usize> {
        let (x, y) = self.coords_of(index);
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        if nx >= self.width || ny >= self.height {
            return None;
        }
        Some(ny * self.width + nx)
    }

    /// Marks a slot usable. Deactivating an occupied slot evicts its module.
    pub fn set_active(&mut self, x: usize, y: usize, active: bool) -> Result<(), GridError> {
        let i = self.index_of(x, y)?;
        let cell = &mut self.cells[i];
        cell.active = active;
        if !active {
            cell.occupant = None;
            cell.reset_scores();
        }
        Ok(())
    }

    pub fn set_supercharged(
        &mut self,
        x: usize,
        y: usize,
        supercharged: bool,
    ) -> Result<(), GridError> {
        let i = self.index_of(x, y)?;
        self.cells[i].supercharged = supercharged;
        Ok(())
    }

    pub fn place_module(&mut self, x: usize, y: usize, module: &Module) -> Result<(), GridError> {
        let i = self.index_of(x, y)?;
        self.place_at(i, Occupant::from(module))
    }

    pub fn place_at(&mut self, index: usize, occupant: Occupant) -> Result<(), GridError> {
        let (x, y) = self.coords_of(index);
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(GridError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            })?;
        if !cell.active {
            return Err(GridError::InvalidPlacement { x, y });
        }
        cell.occupant = Some(occupant);
        Ok(())
    }

    pub fn clear(&mut self, x: usize, y: usize) -> Result<Option<Occupant>, GridError> {
        let i = self.index_of(x, y)?;
        Ok(self.take_at(i))
    }

    pub fn take_at(&mut self, index: usize) -> Option<Occupant> {
        let cell = &mut self.cells[index];
        cell.reset_scores();
        cell.occupant.take()
    }

    /// Exchanges the occupants of two cells. Both cells must be active.
    pub(crate) fn swap_occupants(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (lo, hi) = (a.min(b), a.max(b));
        let (head, tail) = self.cells.split_at_mut(hi);
        std::mem::swap(&mut head[lo].occupant, &mut tail[0].occupant);
    }

    /// Moves the occupant of `from` into the empty cell `to`.
    pub(crate) fn move_occupant(&mut self, from: usize, to: usize) {
        let occupant = self.cells[from].occupant.take();
        self.cells[from].reset_scores();
        self.cells[to].occupant = occupant;
    }

    /// Empties every cell holding a module of `tech`. Returns how many were cleared.
    pub fn clear_tech(&mut self, tech: &str) -> usize {
        let mut cleared = 0;
        for cell in &mut self.cells {
            if cell.tech() == Some(tech) {
                cell.occupant = None;
                cell.reset_scores();
                cleared += 1;
            }
        }
        cleared
    }

    /// Empties every cell holding a module that does not belong to `tech`.
    pub fn clear_other_techs(&mut self, tech: &str) -> usize {
        let mut cleared = 0;
        for cell in &mut self.cells {
            if cell.tech().is_some_and(|t| t != tech) {
                cell.occupant = None;
                cell.reset_scores();
                cleared += 1;
            }
        }
        cleared
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().filter(|c| c.active).count()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_occupied()).count()
    }

    pub fn supercharged_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| c.active && c.supercharged)
            .count()
    }
}
