use crate::core::models::grid::{Grid, GridError, Occupant};
use crate::core::models::module::Module;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use tracing::debug;

/// Clears the region and fills it with `candidates` in random slots.
///
/// Candidates beyond the region size are left unplaced; surplus slots stay empty.
pub fn place_random<R: Rng>(
    grid: &mut Grid,
    region: &[usize],
    candidates: &[Module],
    rng: &mut R,
) -> Result<usize, GridError> {
    for &index in region {
        grid.take_at(index);
    }

    let mut slots = region.to_vec();
    slots.shuffle(rng);

    let mut placed = 0;
    for (&index, module) in slots.iter().zip(candidates) {
        grid.place_at(index, Occupant::from(module))?;
        placed += 1;
    }
    debug!(placed, region = region.len(), "Placed candidates randomly.");
    Ok(placed)
}

/// Keeps the caller's placements where they match the candidate list and places the rest.
///
/// A region cell keeps its module only while the candidate multiset still has an
/// unclaimed copy of it (claimed in row-major order). Anything else in the region
/// is cleared. Unclaimed candidates then go, in candidate order, onto randomly
/// chosen empty region cells.
pub fn place_from_current<R: Rng>(
    grid: &mut Grid,
    region: &[usize],
    candidates: &[Module],
    rng: &mut R,
) -> Result<usize, GridError> {
    let tech = candidates.first().map(|m| m.tech.as_str());
    let mut remaining: HashMap<String, usize> = HashMap::new();
    for module in candidates {
        *remaining.entry(module.id.clone()).or_default() += 1;
    }

    let mut kept = 0;
    for &index in region {
        let claimed = match &grid.cell_at(index).occupant {
            Some(occupant) if Some(occupant.tech.as_str()) == tech => {
                match remaining.get_mut(occupant.module_id.as_str()) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        };
        if claimed {
            kept += 1;
        } else {
            grid.take_at(index);
        }
    }

    let mut empty: Vec<usize> = region
        .iter()
        .copied()
        .filter(|&index| !grid.cell_at(index).is_occupied())
        .collect();
    empty.shuffle(rng);
    let mut empty = empty.into_iter();

    let mut placed = 0;
    for module in candidates {
        let Some(count) = remaining.get_mut(module.id.as_str()) else {
            continue;
        };
        if *count == 0 {
            continue;
        }
        let Some(index) = empty.next() else {
            break;
        };
        *count -= 1;
        grid.place_at(index, Occupant::from(module))?;
        placed += 1;
    }

    debug!(kept, placed, "Seeded search from the current grid.");
    Ok(kept + placed)
}
