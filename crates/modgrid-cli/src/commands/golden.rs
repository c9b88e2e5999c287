use crate::cli::{ConfigArgs, GoldenArgs, GoldenCommands};
use crate::config::build_config;
use crate::error::{CliError, Result};
use modgrid::workflows::golden;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Seed recorded when neither `--seed` nor the config file provides one.
const DEFAULT_FIXTURE_SEED: u64 = 42;

pub async fn run(args: GoldenArgs) -> Result<()> {
    tokio::task::block_in_place(|| match args.command {
        GoldenCommands::Generate {
            config,
            ship,
            tech,
            output,
        } => handle_generate(&config, &ship, &tech, &output),
        GoldenCommands::Verify { files, tolerance } => handle_verify(&files, tolerance),
    })
}

fn handle_generate(args: &ConfigArgs, ship: &str, tech: &str, output: &Path) -> Result<()> {
    let config = build_config(args, None)?;
    let catalog = config.load_catalog()?;
    let seed = config.annealing.seed.unwrap_or(DEFAULT_FIXTURE_SEED);

    let fixture = golden::generate(
        &catalog,
        ship,
        tech,
        &config.annealing,
        &config.scoring,
        seed,
    )?;
    fixture.write_to_path(output)?;

    println!(
        "✓ Fixture for '{}' on '{}' (seed {}, score {:.4}) written to: {}",
        tech,
        ship,
        seed,
        fixture.output.score,
        output.display()
    );
    Ok(())
}

fn handle_verify(files: &[PathBuf], tolerance: f64) -> Result<()> {
    info!(files = files.len(), tolerance, "Verifying golden fixtures.");

    let results = golden::verify_all(files, tolerance);

    let mut failures = 0usize;
    for (path, result) in &results {
        match result {
            Ok(report) => println!(
                "✓ {} (score {:.4}, {} steps)",
                path.display(),
                report.actual_score,
                report.iterations
            ),
            Err(e) => {
                failures += 1;
                warn!("Fixture {:?} failed: {}", path, e);
                println!("✗ {}: {}", path.display(), e);
            }
        }
    }

    if failures > 0 {
        return Err(CliError::Argument(format!(
            "{} of {} fixture(s) did not verify",
            failures,
            files.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modgrid::workflows::golden::GoldenFixture;
    use tempfile::tempdir;

    fn fixture_args() -> ConfigArgs {
        ConfigArgs {
            seed: Some(9),
            max_iterations: Some(1_000),
            time_budget: Some(60.0),
            ..ConfigArgs::default()
        }
    }

    #[test]
    fn generated_fixtures_verify() {
        let dir = tempdir().unwrap();
        let infra = dir.path().join("infra.json");
        let pulse = dir.path().join("pulse.json");
        handle_generate(&fixture_args(), "sentinel", "infra", &infra).unwrap();
        handle_generate(&fixture_args(), "sentinel", "pulse", &pulse).unwrap();

        let fixture = GoldenFixture::read_from_path(&infra).unwrap();
        assert_eq!(fixture.inputs.seed, 9);
        assert_eq!(fixture.inputs.params.max_iterations, Some(1_000));

        handle_verify(&[infra, pulse], golden::DEFAULT_TOLERANCE).unwrap();
    }

    #[test]
    fn verify_fails_when_any_fixture_mismatches() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.json");
        let bad = dir.path().join("bad.json");
        handle_generate(&fixture_args(), "sentinel", "infra", &good).unwrap();

        let mut fixture = GoldenFixture::read_from_path(&good).unwrap();
        fixture.output.score += 10.0;
        fixture.write_to_path(&bad).unwrap();

        let result = handle_verify(&[good, bad], golden::DEFAULT_TOLERANCE);
        match result {
            Err(CliError::Argument(msg)) => assert!(msg.starts_with("1 of 2")),
            other => panic!("expected a verification failure, got {:?}", other),
        }
    }

    #[test]
    fn missing_fixture_counts_as_failure() {
        let dir = tempdir().unwrap();
        let result = handle_verify(&[dir.path().join("absent.json")], 1e-4);
        assert!(matches!(result, Err(CliError::Argument(_))));
    }
}
