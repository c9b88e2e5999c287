use crate::core::models::grid::Grid;
use std::time::Duration;

/// A point-in-time view of a running search.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub best_score: f64,
    /// Fraction of the run completed, in `[0, 1]`. Never decreases within a run.
    pub progress: f64,
    pub temperature: f64,
    pub elapsed: Duration,
    /// Present only when the caller asked for grid updates.
    pub best_grid: Option<Grid>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        self.progress * 100.0
    }
}

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    Snapshot(ProgressSnapshot),

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
    include_grid: bool,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
            include_grid: false,
        }
    }

    /// Attach a copy of the best grid to every snapshot.
    pub fn with_grid_updates(mut self, include_grid: bool) -> Self {
        self.include_grid = include_grid;
        self
    }

    pub fn wants_grid(&self) -> bool {
        self.include_grid && self.callback.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.callback.is_some()
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
