use crate::cli::OptimizeArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::server::protocol::ResultPayload;
use crate::ui::{CliProgressHandler, UiEvent};
use modgrid::core::io::dto::GridDto;
use modgrid::core::models::grid::Grid;
use modgrid::engine::cancel::CancellationToken;
use modgrid::engine::error::EngineError;
use modgrid::engine::progress::ProgressReporter;
use modgrid::workflows::optimize::{OptimizeRequest, PreparedJob};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(args: OptimizeArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let config = build_config(&args.config, None)?;
    let catalog = config.load_catalog()?;

    let grid = match &args.grid {
        Some(path) => {
            info!("Loading input grid from {:?}", path);
            Some(read_grid(path)?)
        }
        None => None,
    };

    let request = OptimizeRequest {
        ship: args.ship.clone(),
        tech: args.tech.clone(),
        player_owned_rewards: args.rewards.clone(),
        available_modules: (!args.modules.is_empty()).then(|| args.modules.clone()),
        forced: args.forced,
        experimental_window_sizing: args.window_sizing,
        grid,
        seed: None,
    };
    let job = PreparedJob::prepare(&catalog, request, &config.annealing, &config.scoring)?;

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let cancel = CancellationToken::new();

    println!("Optimizing '{}' on '{}'...", args.tech, args.ship);
    let result = tokio::task::block_in_place(|| job.run(&reporter, &cancel))?;
    info!(
        score = result.score,
        tech_score = result.tech_score,
        seed = result.seed,
        iterations = result.stats.iterations,
        reheats = result.stats.reheats,
        termination = ?result.termination,
        "Optimization finished."
    );

    let payload = ResultPayload::from(&result);
    match &args.output {
        Some(path) => {
            write_json(path, &payload)?;
            println!(
                "✓ Best layout (score {:.4}, seed {}) written to: {}",
                result.score,
                result.seed,
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, &payload)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

fn read_grid(path: &Path) -> Result<Grid> {
    let file = File::open(path)?;
    let dto: GridDto =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
    Ok(Grid::try_from(&dto).map_err(EngineError::from)?)
}

fn write_json(path: &Path, payload: &ResultPayload) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, payload)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modgrid::core::models::module::Module;
    use tempfile::tempdir;

    #[test]
    fn read_grid_round_trips_a_written_grid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.json");
        let mut grid = Grid::new(3, 2).unwrap();
        grid.set_active(0, 0, true).unwrap();
        grid.set_supercharged(0, 0, true).unwrap();
        let ik = Module::new("IK", "infra", 1.0);
        grid.place_module(0, 0, &ik).unwrap();
        std::fs::write(&path, serde_json::to_string(&GridDto::from(&grid)).unwrap()).unwrap();

        let loaded = read_grid(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 2));
        assert_eq!(loaded.active_count(), 1);
        assert_eq!(loaded.occupied_count(), 1);
    }

    #[test]
    fn read_grid_reports_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_grid(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn read_grid_rejects_ragged_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.json");
        std::fs::write(
            &path,
            r#"{"width": 2, "height": 1, "cells": [[{"active": true}]]}"#,
        )
        .unwrap();
        assert!(matches!(read_grid(&path), Err(CliError::Engine(_))));
    }
}
