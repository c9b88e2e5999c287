use crate::core::models::grid::{Grid, GridError};
use super::registry::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Inactive,
    Active,
    Supercharged,
}

impl SlotKind {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(SlotKind::Inactive),
            'o' => Some(SlotKind::Active),
            'S' => Some(SlotKind::Supercharged),
            _ => None,
        }
    }
}

/// The static slot map of a ship: which coordinates are usable and which are supercharged.
///
/// Layouts are written as rows of characters: `.` for an inactive slot, `o` for an
/// active slot and `S` for an active, supercharged slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipLayout {
    width: usize,
    height: usize,
    slots: Vec<SlotKind>,
}

impl ShipLayout {
    pub fn parse(ship: &str, rows: &[String]) -> Result<Self, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidLayout {
            ship: ship.to_string(),
            reason,
        };

        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(invalid("layout must have at least one non-empty row".into()));
        }

        let mut slots = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(invalid(format!(
                    "row {} has {} slots, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            for (x, c) in row.chars().enumerate() {
                let slot = SlotKind::from_char(c).ok_or_else(|| {
                    invalid(format!("unexpected slot character '{}' at ({}, {})", c, x, y))
                })?;
                slots.push(slot);
            }
        }

        Ok(Self {
            width,
            height,
            slots,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn slot(&self, x: usize, y: usize) -> Option<SlotKind> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.slots[y * self.width + x])
    }

    /// Builds an empty grid with this layout's slot eligibility applied.
    pub fn to_grid(&self) -> Result<Grid, GridError> {
        let mut grid = Grid::new(self.width, self.height)?;
        for (i, slot) in self.slots.iter().enumerate() {
            let (x, y) = (i % self.width, i / self.width);
            match slot {
                SlotKind::Inactive => {}
                SlotKind::Active => grid.set_active(x, y, true)?,
                SlotKind::Supercharged => {
                    grid.set_active(x, y, true)?;
                    grid.set_supercharged(x, y, true)?;
                }
            }
        }
        Ok(grid)
    }
}
