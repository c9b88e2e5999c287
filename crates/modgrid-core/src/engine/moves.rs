use crate::core::models::grid::Grid;
use rand::Rng;

/// A reversible change to the working grid.
///
/// Slot fields index into the sampler's occupied/empty lists so the lists can be
/// restored in constant time on revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Swap {
        a: usize,
        b: usize,
    },
    Relocate {
        from: usize,
        to: usize,
        occupied_slot: usize,
        empty_slot: usize,
    },
    Noop,
}

/// Proposes and applies moves within a fixed search region.
///
/// Tracks which region cells are occupied so that proposals never scan the grid.
#[derive(Debug, Clone)]
pub struct MoveSampler {
    occupied: Vec<usize>,
    empty: Vec<usize>,
}

impl MoveSampler {
    pub fn new(grid: &Grid, region: &[usize]) -> Self {
        let (occupied, empty): (Vec<usize>, Vec<usize>) = region
            .iter()
            .copied()
            .partition(|&index| grid.cell_at(index).is_occupied());
        Self { occupied, empty }
    }

    pub fn occupied(&self) -> &[usize] {
        &self.occupied
    }

    pub fn empty(&self) -> &[usize] {
        &self.empty
    }

    pub fn can_swap(&self) -> bool {
        self.occupied.len() >= 2
    }

    pub fn can_relocate(&self) -> bool {
        !self.occupied.is_empty() && !self.empty.is_empty()
    }

    /// Draws a move, applies it to `grid` and returns it for a possible revert.
    ///
    /// A swap is preferred with probability `swap_probability`. When the preferred
    /// kind is impossible the other kind is used; when neither is possible the
    /// move is a no-op.
    pub fn propose_and_apply<R: Rng>(
        &mut self,
        grid: &mut Grid,
        swap_probability: f64,
        rng: &mut R,
    ) -> Move {
        let prefer_swap = rng.r#gen::<f64>() < swap_probability;
        let mv = match (prefer_swap, self.can_swap(), self.can_relocate()) {
            (true, true, _) | (false, true, false) => self.draw_swap(rng),
            (false, _, true) | (true, false, true) => self.draw_relocate(rng),
            _ => Move::Noop,
        };
        self.apply(grid, mv);
        mv
    }

    fn draw_swap<R: Rng>(&self, rng: &mut R) -> Move {
        let n = self.occupied.len();
        let i = rng.gen_range(0..n);
        let mut j = rng.gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }
        Move::Swap {
            a: self.occupied[i],
            b: self.occupied[j],
        }
    }

    fn draw_relocate<R: Rng>(&self, rng: &mut R) -> Move {
        let occupied_slot = rng.gen_range(0..self.occupied.len());
        let empty_slot = rng.gen_range(0..self.empty.len());
        Move::Relocate {
            from: self.occupied[occupied_slot],
            to: self.empty[empty_slot],
            occupied_slot,
            empty_slot,
        }
    }

    pub fn apply(&mut self, grid: &mut Grid, mv: Move) {
        match mv {
            Move::Swap { a, b } => grid.swap_occupants(a, b),
            Move::Relocate {
                from,
                to,
                occupied_slot,
                empty_slot,
            } => {
                grid.move_occupant(from, to);
                self.occupied[occupied_slot] = to;
                self.empty[empty_slot] = from;
            }
            Move::Noop => {}
        }
    }

    pub fn revert(&mut self, grid: &mut Grid, mv: Move) {
        match mv {
            Move::Swap { a, b } => grid.swap_occupants(a, b),
            Move::Relocate {
                from,
                to,
                occupied_slot,
                empty_slot,
            } => {
                grid.move_occupant(to, from);
                self.occupied[occupied_slot] = from;
                self.empty[empty_slot] = to;
            }
            Move::Noop => {}
        }
    }
}
