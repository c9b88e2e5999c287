use crate::core::models::grid::Grid;

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub score: f64,
    pub grid: Grid,
}

/// Working state of one annealing run: the grid being mutated plus the best seen so far.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub working: Grid,
    pub current_score: f64,
    pub best: Solution,
    pub steps_without_improvement: usize,
}

impl SearchState {
    pub fn new(grid: Grid, score: f64) -> Self {
        Self {
            best: Solution {
                score,
                grid: grid.clone(),
            },
            working: grid,
            current_score: score,
            steps_without_improvement: 0,
        }
    }

    /// Closes a step. Records the working grid as the new best if it strictly
    /// beats it; otherwise counts the step towards stagnation.
    pub fn finish_step(&mut self) -> bool {
        if self.current_score > self.best.score {
            self.best.score = self.current_score;
            self.best.grid.clone_from(&self.working);
            self.steps_without_improvement = 0;
            true
        } else {
            self.steps_without_improvement += 1;
            false
        }
    }
}
