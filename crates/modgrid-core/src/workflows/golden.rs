use crate::core::catalog::registry::Catalog;
use crate::core::io::dto::GridDto;
use crate::core::models::grid::{Grid, GridError};
use crate::core::models::module::Module;
use crate::core::scoring::ScoringParams;
use crate::engine::annealing::Termination;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::AnnealingParams;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::workflows::optimize::{OptimizeResult, PreparedJob, RegionOptions};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Step budget applied to fixtures whose parameters do not set one.
pub const DEFAULT_FIXTURE_ITERATIONS: u64 = 20_000;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
/// Seed assumed for fixtures that do not record one.
pub const DEFAULT_FIXTURE_SEED: u64 = 42;

fn default_fixture_seed() -> u64 {
    DEFAULT_FIXTURE_SEED
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid fixture JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Fixture grid is invalid: {0}")]
    Grid(#[from] GridError),
    #[error("Engine failed while replaying the fixture: {0}")]
    Engine(#[from] EngineError),
    #[error(
        "Replay hit the wall-clock budget after {iterations} steps; raise max_processing_time or lower max_iterations"
    )]
    NonDeterministic { iterations: u64 },
    #[error("Score mismatch: expected {expected}, got {actual} (tolerance {tolerance})")]
    ScoreMismatch {
        expected: f64,
        actual: f64,
        tolerance: f64,
    },
    #[error("Placement mismatch at ({x}, {y}): expected {expected:?}, got {actual:?}")]
    PlacementMismatch {
        x: usize,
        y: usize,
        expected: Option<String>,
        actual: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureInputs {
    pub grid: GridDto,
    pub ship: String,
    /// Every module of the ship, for reference.
    pub modules: Vec<Module>,
    pub tech: String,
    /// The candidate list the optimizer places.
    pub tech_modules: Vec<Module>,
    pub params: AnnealingParams,
    #[serde(default)]
    pub scoring: ScoringParams,
    #[serde(default = "default_fixture_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureOutput {
    pub grid: GridDto,
    pub score: f64,
}

/// A recorded optimization that any conforming engine must reproduce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenFixture {
    pub inputs: FixtureInputs,
    pub output: FixtureOutput,
}

impl GoldenFixture {
    /// Reads a fixture from a JSON stream.
    ///
    /// # Arguments
    ///
    /// * `reader` - Source of the JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Json`] if the document does not parse.
    pub fn read_from(reader: impl Read) -> Result<Self, FixtureError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Writes the fixture as pretty-printed JSON.
    ///
    /// # Arguments
    ///
    /// * `writer` - Destination of the JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Json`] if serialization or writing fails.
    pub fn write_to(&self, writer: impl Write) -> Result<(), FixtureError> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    pub fn read_from_path(path: &Path) -> Result<Self, FixtureError> {
        let file = File::open(path).map_err(|e| FixtureError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::read_from(BufReader::new(file))
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), FixtureError> {
        let io_error = |e| FixtureError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        };
        let file = File::create(path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush().map_err(io_error)
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    pub expected_score: f64,
    pub actual_score: f64,
    pub iterations: u64,
}

/// Runs the optimizer for `ship`/`tech` on the ship's layout and records the result.
///
/// The recorded output comes from [`replay`] on the recorded inputs, so a fixture
/// always verifies against the engine that generated it.
#[instrument(skip_all, name = "golden_generate", fields(ship = %ship, tech = %tech, seed = seed))]
pub fn generate(
    catalog: &Catalog,
    ship: &str,
    tech: &str,
    params: &AnnealingParams,
    scoring: &ScoringParams,
    seed: u64,
) -> Result<GoldenFixture, FixtureError> {
    let definition = catalog.ship(ship).map_err(EngineError::from)?;
    let tech_modules = catalog
        .candidate_modules(ship, tech, &[])
        .map_err(EngineError::from)?;
    let modules = catalog.all_modules(ship).map_err(EngineError::from)?;
    let grid = definition.layout.to_grid()?;

    let mut params = params.clone();
    params.seed = Some(seed);
    params.max_iterations.get_or_insert(DEFAULT_FIXTURE_ITERATIONS);

    let inputs = FixtureInputs {
        grid: GridDto::from(&grid),
        ship: ship.to_string(),
        modules,
        tech: tech.to_string(),
        tech_modules,
        params,
        scoring: *scoring,
        seed,
    };

    let result = replay(&inputs)?;
    info!(
        score = result.score,
        iterations = result.stats.iterations,
        "Golden fixture generated."
    );
    Ok(GoldenFixture {
        output: FixtureOutput {
            grid: GridDto::from(&result.grid),
            score: result.score,
        },
        inputs,
    })
}

/// Re-runs the optimizer on recorded inputs. The catalog is not consulted.
pub fn replay(inputs: &FixtureInputs) -> Result<OptimizeResult, FixtureError> {
    let grid = Grid::try_from(&inputs.grid)?;
    let mut params = inputs.params.clone();
    params.seed = Some(inputs.seed);

    let job = PreparedJob::from_parts(
        grid,
        inputs.tech.clone(),
        inputs.tech_modules.clone(),
        params,
        inputs.scoring,
        RegionOptions::default(),
    )?;
    let result = job.run(&ProgressReporter::new(), &CancellationToken::new())?;
    if result.termination == Termination::TimeBudget {
        return Err(FixtureError::NonDeterministic {
            iterations: result.stats.iterations,
        });
    }
    Ok(result)
}

/// Replays a fixture and checks score and per-cell placement against its output.
#[instrument(skip_all, name = "golden_verify", fields(ship = %fixture.inputs.ship, tech = %fixture.inputs.tech))]
pub fn verify(fixture: &GoldenFixture, tolerance: f64) -> Result<VerifyReport, FixtureError> {
    let result = replay(&fixture.inputs)?;
    let expected = &fixture.output;

    if (result.score - expected.score).abs() > tolerance {
        return Err(FixtureError::ScoreMismatch {
            expected: expected.score,
            actual: result.score,
            tolerance,
        });
    }

    let actual = GridDto::from(&result.grid);
    if actual.width != expected.grid.width || actual.height != expected.grid.height {
        return Err(FixtureError::Grid(GridError::ShapeMismatch(format!(
            "expected {}x{}, got {}x{}",
            expected.grid.width, expected.grid.height, actual.width, actual.height
        ))));
    }
    for (y, (expected_row, actual_row)) in expected.grid.cells.iter().zip(&actual.cells).enumerate()
    {
        for (x, (e, a)) in expected_row.iter().zip(actual_row).enumerate() {
            if e.module != a.module {
                return Err(FixtureError::PlacementMismatch {
                    x,
                    y,
                    expected: e.module.clone(),
                    actual: a.module.clone(),
                });
            }
        }
    }

    Ok(VerifyReport {
        expected_score: expected.score,
        actual_score: result.score,
        iterations: result.stats.iterations,
    })
}

/// Reads and verifies every fixture file, one result per path in input order.
///
/// Fixtures are independent, so with the `parallel` feature they replay on the
/// rayon pool.
#[instrument(skip_all, name = "golden_verify_all", fields(files = paths.len()))]
pub fn verify_all(
    paths: &[PathBuf],
    tolerance: f64,
) -> Vec<(PathBuf, Result<VerifyReport, FixtureError>)> {
    #[cfg(not(feature = "parallel"))]
    let iterator = paths.iter();

    #[cfg(feature = "parallel")]
    let iterator = paths.par_iter();

    iterator
        .map(|path| {
            let result = GoldenFixture::read_from_path(path)
                .and_then(|fixture| verify(&fixture, tolerance));
            (path.clone(), result)
        })
        .collect()
}
