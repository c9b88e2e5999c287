use super::context::AnnealingContext;
use super::error::EngineError;
use super::moves::MoveSampler;
use super::progress::{Progress, ProgressSnapshot};
use super::state::{SearchState, Solution};
use super::utils::sampling::metropolis_accept;
use crate::core::models::grid::Grid;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Temperature fell below the stopping temperature.
    Cooled,
    /// The wall-clock budget ran out.
    TimeBudget,
    /// The step budget ran out.
    IterationBudget,
    /// The region held nothing to move, so no search ran.
    NoMoves,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnnealingStats {
    pub iterations: u64,
    pub accepted: u64,
    pub improvements: u64,
    pub reheats: u32,
    pub final_temperature: f64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct AnnealingOutcome {
    /// Best grid seen, with score annotations written.
    pub best: Solution,
    pub stats: AnnealingStats,
    pub termination: Termination,
}

struct ProgressClock {
    started: Instant,
    last_report: Instant,
    interval: Duration,
    fraction: f64,
}

impl ProgressClock {
    fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_report: now,
            interval,
            fraction: 0.0,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn due(&self) -> bool {
        self.last_report.elapsed() >= self.interval
    }

    /// Advances the monotone progress fraction and returns it.
    fn advance(&mut self, ctx: &AnnealingContext, temperature: f64, iterations: u64) -> f64 {
        let budget = ctx.params.time_budget().as_secs_f64();
        let by_time = if budget > 0.0 {
            self.elapsed().as_secs_f64() / budget
        } else {
            1.0
        };
        let by_steps = ctx
            .params
            .max_iterations
            .map_or(0.0, |max| iterations as f64 / max as f64);
        let by_temperature = ctx.params.cooling_fraction(temperature);
        self.fraction = self
            .fraction
            .max(by_time)
            .max(by_steps)
            .max(by_temperature)
            .min(1.0);
        self.fraction
    }
}

fn emit_snapshot(
    ctx: &AnnealingContext,
    state: &SearchState,
    progress: f64,
    temperature: f64,
    elapsed: Duration,
) -> Result<(), EngineError> {
    let best_grid = if ctx.reporter.wants_grid() {
        let mut grid = state.best.grid.clone();
        ctx.scorer.score(&mut grid)?;
        Some(grid)
    } else {
        None
    };
    ctx.reporter.report(Progress::Snapshot(ProgressSnapshot {
        best_score: state.best.score,
        progress,
        temperature,
        elapsed,
        best_grid,
    }));
    Ok(())
}

/// Runs simulated annealing over `region` of an already-populated grid.
///
/// The caller owns initial placement. Every random draw comes from `rng`, so a
/// run that ends by cooling or by its step budget is reproducible from the seed.
/// Returns [`EngineError::Cancelled`] as soon as the token is observed.
#[instrument(skip_all, name = "simulated_annealing", fields(region = region.len()))]
pub fn run<R: Rng>(
    ctx: &AnnealingContext,
    grid: Grid,
    region: &[usize],
    rng: &mut R,
) -> Result<AnnealingOutcome, EngineError> {
    let params = ctx.params;
    let mut clock = ProgressClock::new(params.progress_interval());
    let initial_score = ctx.scorer.evaluate(&grid)?;
    let mut sampler = MoveSampler::new(&grid, region);
    let mut state = SearchState::new(grid, initial_score);
    let mut stats = AnnealingStats::default();
    let mut temperature = params.initial_temperature;

    if sampler.occupied().is_empty() {
        debug!("Nothing to move; skipping search.");
        stats.final_temperature = temperature;
        return finish(ctx, state, stats, Termination::NoMoves, &clock);
    }

    ctx.reporter.report(Progress::PhaseStart {
        name: "Simulated Annealing",
    });
    info!(
        initial_score,
        occupied = sampler.occupied().len(),
        empty = sampler.empty().len(),
        "Starting simulated annealing."
    );

    let time_budget = params.time_budget();
    let termination = 'search: loop {
        if temperature < params.stopping_temperature {
            break Termination::Cooled;
        }

        for _ in 0..params.iterations_per_temperature_step {
            if ctx.cancel.is_cancelled() {
                info!(iterations = stats.iterations, "Search cancelled.");
                return Err(EngineError::Cancelled);
            }
            if clock.elapsed() >= time_budget {
                break 'search Termination::TimeBudget;
            }
            if params
                .max_iterations
                .is_some_and(|max| stats.iterations >= max)
            {
                break 'search Termination::IterationBudget;
            }

            let swap_probability = params.swap_probability(temperature);
            let mv = sampler.propose_and_apply(&mut state.working, swap_probability, rng);
            let new_score = ctx.scorer.evaluate(&state.working)?;
            let delta = new_score - state.current_score;
            stats.iterations += 1;

            if metropolis_accept(delta, temperature, rng) {
                state.current_score = new_score;
                stats.accepted += 1;
            } else {
                sampler.revert(&mut state.working, mv);
            }

            if state.finish_step() {
                stats.improvements += 1;
            }

            if params.max_steps_without_improvement > 0
                && state.steps_without_improvement >= params.max_steps_without_improvement
            {
                temperature = params.initial_temperature * params.reheat_factor;
                state.steps_without_improvement = 0;
                stats.reheats += 1;
                debug!(
                    temperature,
                    best_score = state.best.score,
                    "Reheating after stagnation."
                );
            }

            if ctx.reporter.is_active() && clock.due() {
                let progress = clock.advance(ctx, temperature, stats.iterations);
                emit_snapshot(ctx, &state, progress, temperature, clock.elapsed())?;
                clock.last_report = Instant::now();
            }
        }

        temperature *= params.cooling_rate;
    };

    stats.final_temperature = temperature;
    ctx.reporter.report(Progress::Message(format!(
        "Best score {:.4} after {} steps ({} reheats)",
        state.best.score, stats.iterations, stats.reheats
    )));
    ctx.reporter.report(Progress::PhaseFinish);
    finish(ctx, state, stats, termination, &clock)
}

fn finish(
    ctx: &AnnealingContext,
    state: SearchState,
    mut stats: AnnealingStats,
    termination: Termination,
    clock: &ProgressClock,
) -> Result<AnnealingOutcome, EngineError> {
    stats.elapsed = clock.elapsed();
    if ctx.reporter.is_active() {
        emit_snapshot(ctx, &state, 1.0, stats.final_temperature, stats.elapsed)?;
    }

    let mut best = state.best;
    best.score = ctx.scorer.score(&mut best.grid)?;

    info!(
        best_score = best.score,
        iterations = stats.iterations,
        accepted = stats.accepted,
        reheats = stats.reheats,
        termination = ?termination,
        "Simulated annealing finished."
    );
    Ok(AnnealingOutcome {
        best,
        stats,
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::module::{AdjacencyKind, Module};
    use crate::core::scoring::{Scorer, ScoringParams};
    use crate::engine::cancel::CancellationToken;
    use crate::engine::config::{AnnealingParams, AnnealingParamsBuilder};
    use crate::engine::placement::place_random;
    use crate::engine::progress::ProgressReporter;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Mutex;

    fn setup(seed: u64) -> (Grid, Vec<usize>) {
        let mut grid = Grid::new(4, 3).unwrap();
        for y in 0..3 {
            for x in 0..4 {
                grid.set_active(x, y, true).unwrap();
            }
        }
        grid.set_supercharged(1, 1, true).unwrap();
        grid.set_supercharged(2, 1, true).unwrap();
        let modules = vec![
            Module::new("IK", "infra", 1.0)
                .with_adjacency(AdjacencyKind::Cross)
                .with_sc_eligible(true),
            Module::new("Xa", "infra", 0.42)
                .with_adjacency(AdjacencyKind::Cross)
                .with_sc_eligible(true),
            Module::new("Xb", "infra", 0.39)
                .with_adjacency(AdjacencyKind::Cross)
                .with_sc_eligible(true),
            Module::new("QR", "infra", 0.05).with_adjacency(AdjacencyKind::Lesser),
        ];
        let region: Vec<usize> = (0..grid.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        place_random(&mut grid, &region, &modules, &mut rng).unwrap();
        (grid, region)
    }

    fn bounded_params() -> AnnealingParams {
        AnnealingParamsBuilder::new()
            .max_processing_time(30.0)
            .max_iterations(2_000)
            .build()
            .unwrap()
    }

    fn run_with(
        params: &AnnealingParams,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
        seed: u64,
    ) -> Result<AnnealingOutcome, EngineError> {
        let scoring = ScoringParams::default();
        let ctx = AnnealingContext::new(params, Scorer::new(&scoring), reporter, cancel);
        let (grid, region) = setup(seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        run(&ctx, grid, &region, &mut rng)
    }

    #[test]
    fn best_score_never_below_initial() {
        let params = bounded_params();
        let scoring = ScoringParams::default();
        let (grid, _) = setup(3);
        let initial = Scorer::new(&scoring).evaluate(&grid).unwrap();

        let outcome = run_with(
            &params,
            &ProgressReporter::new(),
            &CancellationToken::new(),
            3,
        )
        .unwrap();
        assert!(outcome.best.score >= initial);
        assert_eq!(
            outcome.best.score,
            Scorer::new(&scoring).evaluate(&outcome.best.grid).unwrap()
        );
    }

    #[test]
    fn same_seed_reproduces_the_same_result() {
        let params = bounded_params();
        let a = run_with(&params, &ProgressReporter::new(), &CancellationToken::new(), 42).unwrap();
        let b = run_with(&params, &ProgressReporter::new(), &CancellationToken::new(), 42).unwrap();
        assert_eq!(a.termination, Termination::IterationBudget);
        assert_eq!(a.best.score.to_bits(), b.best.score.to_bits());
        assert_eq!(a.best.grid, b.best.grid);
        assert_eq!(a.stats.iterations, b.stats.iterations);
        assert_eq!(a.stats.accepted, b.stats.accepted);
    }

    #[test]
    fn cools_to_stopping_temperature_without_reheats() {
        let params = AnnealingParamsBuilder::new()
            .max_processing_time(30.0)
            .max_steps_without_improvement(0)
            .build()
            .unwrap();
        let outcome = run_with(
            &params,
            &ProgressReporter::new(),
            &CancellationToken::new(),
            8,
        )
        .unwrap();
        assert_eq!(outcome.termination, Termination::Cooled);
        assert_eq!(outcome.stats.reheats, 0);
        assert!(outcome.stats.final_temperature < params.stopping_temperature);
        // ceil(ln(1e-3) / ln(0.95)) levels of 5 steps each.
        assert_eq!(outcome.stats.iterations, 135 * 5);
    }

    #[test]
    fn stagnation_triggers_reheats() {
        let params = AnnealingParamsBuilder::new()
            .max_processing_time(30.0)
            .max_steps_without_improvement(10)
            .max_iterations(500)
            .build()
            .unwrap();
        let outcome = run_with(
            &params,
            &ProgressReporter::new(),
            &CancellationToken::new(),
            5,
        )
        .unwrap();
        assert!(outcome.stats.reheats > 0);
    }

    #[test]
    fn summary_message_precedes_phase_finish() {
        let params = AnnealingParamsBuilder::new()
            .max_processing_time(30.0)
            .max_steps_without_improvement(10)
            .max_iterations(300)
            .build()
            .unwrap();
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::Message(msg) => events.lock().unwrap().push(msg),
            Progress::PhaseFinish => events.lock().unwrap().push("finish".to_string()),
            _ => {}
        }));
        let outcome = run_with(&params, &reporter, &CancellationToken::new(), 5).unwrap();
        drop(reporter);

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].contains("after 300 steps"));
        assert!(events[0].contains(&format!("({} reheats)", outcome.stats.reheats)));
        assert_eq!(events[1], "finish");
    }

    #[test]
    fn cancelled_token_stops_before_first_move() {
        let params = bounded_params();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_with(&params, &ProgressReporter::new(), &cancel, 1);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn time_budget_ends_the_search() {
        let params = AnnealingParamsBuilder::new()
            .max_processing_time(0.05)
            .build()
            .unwrap();
        let started = Instant::now();
        let outcome = run_with(
            &params,
            &ProgressReporter::new(),
            &CancellationToken::new(),
            2,
        )
        .unwrap();
        assert_eq!(outcome.termination, Termination::TimeBudget);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn progress_is_monotone_and_ends_complete() {
        let params = AnnealingParamsBuilder::new()
            .max_processing_time(0.3)
            .progress_interval_ms(0)
            .build()
            .unwrap();
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::Snapshot(snapshot) = event {
                seen.lock()
                    .unwrap()
                    .push((snapshot.progress, snapshot.best_score));
            }
        }));
        run_with(&params, &reporter, &CancellationToken::new(), 4).unwrap();
        drop(reporter);

        let seen = seen.into_inner().unwrap();
        assert!(seen.len() >= 2);
        for pair in seen.windows(2) {
            assert!(pair[1].0 >= pair[0].0);
            assert!(pair[1].1 >= pair[0].1);
        }
        assert_eq!(seen.last().map(|s| s.0), Some(1.0));
    }

    #[test]
    fn empty_region_returns_input_immediately() {
        let params = bounded_params();
        let scoring = ScoringParams::default();
        let reporter = ProgressReporter::new();
        let cancel = CancellationToken::new();
        let ctx = AnnealingContext::new(&params, Scorer::new(&scoring), &reporter, &cancel);
        let grid = Grid::new(3, 3).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let outcome = run(&ctx, grid.clone(), &[], &mut rng).unwrap();
        assert_eq!(outcome.termination, Termination::NoMoves);
        assert_eq!(outcome.best.score, 0.0);
        assert_eq!(outcome.best.grid, grid);
        assert_eq!(outcome.stats.iterations, 0);
    }
}
