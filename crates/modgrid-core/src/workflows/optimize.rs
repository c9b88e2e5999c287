use crate::core::catalog::registry::Catalog;
use crate::core::models::grid::Grid;
use crate::core::models::module::Module;
use crate::core::scoring::{Scorer, ScoringParams};
use crate::engine::annealing::{self, AnnealingStats, Termination};
use crate::engine::cancel::CancellationToken;
use crate::engine::config::AnnealingParams;
use crate::engine::context::AnnealingContext;
use crate::engine::error::EngineError;
use crate::engine::placement::{place_from_current, place_random};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::window::{cells_in, select_window};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

pub const SOLVE_METHOD: &str = "Simulated Annealing";

/// One optimization as a client asks for it.
#[derive(Debug, Clone, Default)]
pub struct OptimizeRequest {
    pub ship: String,
    pub tech: String,
    pub player_owned_rewards: Vec<String>,
    /// Module ids the player has enabled. Every candidate is kept when absent.
    pub available_modules: Option<Vec<String>>,
    /// Clear other techs' modules instead of working around them.
    pub forced: bool,
    pub experimental_window_sizing: bool,
    /// Caller's grid. The ship's layout is used when absent.
    pub grid: Option<Grid>,
    pub seed: Option<u64>,
}

/// How the search region is derived from the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionOptions {
    pub forced: bool,
    pub window_sizing: bool,
}

#[derive(Debug, Clone)]
pub struct OptimizeResult {
    /// Best grid found, with score annotations.
    pub grid: Grid,
    pub score: f64,
    /// Score contributed by the requested tech alone.
    pub tech_score: f64,
    pub seed: u64,
    pub stats: AnnealingStats,
    pub termination: Termination,
    pub solve_method: &'static str,
}

/// A validated request, ready to run on any thread.
///
/// Everything that can be rejected up front (unknown ship or tech, bad grid,
/// bad parameters) is rejected while preparing, before any search starts.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    tech: String,
    grid: Grid,
    region: Vec<usize>,
    candidates: Vec<Module>,
    params: AnnealingParams,
    scoring: ScoringParams,
}

impl PreparedJob {
    #[instrument(skip_all, name = "prepare_optimization", fields(ship = %request.ship, tech = %request.tech))]
    pub fn prepare(
        catalog: &Catalog,
        request: OptimizeRequest,
        params: &AnnealingParams,
        scoring: &ScoringParams,
    ) -> Result<Self, EngineError> {
        if request.ship.is_empty() {
            return Err(EngineError::MalformedRequest("missing ship".to_string()));
        }
        if request.tech.is_empty() {
            return Err(EngineError::MalformedRequest("missing tech".to_string()));
        }

        let mut candidates =
            catalog.candidate_modules(&request.ship, &request.tech, &request.player_owned_rewards)?;
        if let Some(available) = &request.available_modules {
            candidates.retain(|module| available.iter().any(|id| id == &module.id));
            debug!(
                kept = candidates.len(),
                "Restricted candidates to the available modules."
            );
        }
        let grid = match request.grid {
            Some(grid) => grid,
            None => catalog.ship(&request.ship)?.layout.to_grid()?,
        };

        let mut params = params.clone();
        if request.seed.is_some() {
            params.seed = request.seed;
        }

        Self::from_parts(
            grid,
            request.tech,
            candidates,
            params,
            *scoring,
            RegionOptions {
                forced: request.forced,
                window_sizing: request.experimental_window_sizing,
            },
        )
    }

    /// Builds a job from already-resolved parts, bypassing the catalog.
    pub fn from_parts(
        mut grid: Grid,
        tech: String,
        candidates: Vec<Module>,
        params: AnnealingParams,
        scoring: ScoringParams,
        options: RegionOptions,
    ) -> Result<Self, EngineError> {
        params.validate()?;
        scoring.validate()?;

        if candidates.is_empty() || grid.active_count() == 0 {
            debug!(
                candidates = candidates.len(),
                active = grid.active_count(),
                "Nothing to optimize; the grid will be returned as is."
            );
            return Ok(Self {
                tech,
                grid,
                region: Vec::new(),
                candidates,
                params,
                scoring,
            });
        }

        if options.forced {
            grid.clear_other_techs(&tech);
        }
        if !params.start_from_current_grid {
            grid.clear_tech(&tech);
        }

        let available: Vec<usize> = grid
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.active && cell.tech().is_none_or(|t| t == tech))
            .map(|(index, _)| index)
            .collect();

        let region = if options.window_sizing {
            match select_window(&grid, &available, candidates.len()) {
                Some(window) => cells_in(&grid, &available, &window),
                None => available.clone(),
            }
        } else {
            available.clone()
        };

        if region.len() < available.len() {
            // Modules of the tech left outside the window would be counted twice.
            let mut in_region = vec![false; grid.len()];
            for &index in &region {
                in_region[index] = true;
            }
            for &index in &available {
                if !in_region[index] {
                    grid.take_at(index);
                }
            }
        }

        let locked = grid
            .cells()
            .iter()
            .filter(|cell| cell.tech().is_some_and(|t| t != tech))
            .count();
        info!(
            candidates = candidates.len(),
            available = available.len(),
            region = region.len(),
            locked,
            "Prepared optimization."
        );

        Ok(Self {
            tech,
            grid,
            region,
            candidates,
            params,
            scoring,
        })
    }

    pub fn tech(&self) -> &str {
        &self.tech
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn region(&self) -> &[usize] {
        &self.region
    }

    pub fn candidates(&self) -> &[Module] {
        &self.candidates
    }

    pub fn params(&self) -> &AnnealingParams {
        &self.params
    }

    pub fn scoring(&self) -> &ScoringParams {
        &self.scoring
    }

    /// Runs placement and annealing to completion.
    ///
    /// Blocks the calling thread for up to the configured time budget; run it on a
    /// worker thread when called from async code.
    #[instrument(skip_all, name = "optimize_workflow", fields(tech = %self.tech))]
    pub fn run(
        self,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<OptimizeResult, EngineError> {
        let scorer = Scorer::new(&self.scoring);
        let seed = self
            .params
            .seed
            .unwrap_or_else(|| rand::thread_rng().r#gen());

        if self.region.is_empty() {
            let mut grid = self.grid;
            let score = scorer.score(&mut grid)?;
            let tech_score = scorer.evaluate_tech(&grid, &self.tech)?;
            info!(score, "Returning the input grid unchanged.");
            return Ok(OptimizeResult {
                grid,
                score,
                tech_score,
                seed,
                stats: AnnealingStats {
                    final_temperature: self.params.initial_temperature,
                    ..AnnealingStats::default()
                },
                termination: Termination::NoMoves,
                solve_method: SOLVE_METHOD,
            });
        }

        reporter.report(Progress::PhaseStart { name: "Placement" });
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut grid = self.grid;
        let placed = if self.params.start_from_current_grid {
            place_from_current(&mut grid, &self.region, &self.candidates, &mut rng)?
        } else {
            place_random(&mut grid, &self.region, &self.candidates, &mut rng)?
        };
        info!(placed, seed, "Initial placement complete.");
        reporter.report(Progress::PhaseFinish);

        let ctx = AnnealingContext::new(&self.params, scorer, reporter, cancel);
        let outcome = annealing::run(&ctx, grid, &self.region, &mut rng)?;
        let tech_score = scorer.evaluate_tech(&outcome.best.grid, &self.tech)?;

        Ok(OptimizeResult {
            grid: outcome.best.grid,
            score: outcome.best.score,
            tech_score,
            seed,
            stats: outcome.stats,
            termination: outcome.termination,
            solve_method: SOLVE_METHOD,
        })
    }
}
