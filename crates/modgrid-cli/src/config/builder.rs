use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::{AppConfig, ServerSettings};
use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};
use modgrid::core::scoring::ScoringParams;
use modgrid::engine::config::{AnnealingParams, AnnealingParamsBuilder};
use std::str::FromStr;
use tracing::debug;

/// Merges defaults, the config file, `-S` overrides and flags, in that order.
///
/// `bind` is the `serve` command's own `--bind` flag.
pub fn build_config(args: &ConfigArgs, bind: Option<&str>) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let annealing_file = file_config.annealing.take().unwrap_or_default();
    let scoring_file = file_config.scoring.take().unwrap_or_default();
    let server_file = file_config.server.take().unwrap_or_default();

    let base = defaults.annealing;
    let annealing = AnnealingParams {
        initial_temperature: annealing_file
            .initial_temperature
            .unwrap_or(base.initial_temperature),
        cooling_rate: annealing_file.cooling_rate.unwrap_or(base.cooling_rate),
        stopping_temperature: annealing_file
            .stopping_temperature
            .unwrap_or(base.stopping_temperature),
        iterations_per_temperature_step: annealing_file
            .iterations_per_temperature_step
            .unwrap_or(base.iterations_per_temperature_step),
        initial_swap_probability: annealing_file
            .initial_swap_probability
            .unwrap_or(base.initial_swap_probability),
        final_swap_probability: annealing_file
            .final_swap_probability
            .unwrap_or(base.final_swap_probability),
        start_from_current_grid: annealing_file
            .start_from_current_grid
            .unwrap_or(base.start_from_current_grid),
        max_processing_time: args
            .time_budget
            .or(annealing_file.max_processing_time)
            .unwrap_or(base.max_processing_time),
        max_steps_without_improvement: annealing_file
            .max_steps_without_improvement
            .unwrap_or(base.max_steps_without_improvement),
        reheat_factor: annealing_file.reheat_factor.unwrap_or(base.reheat_factor),
        seed: args.seed.or(annealing_file.seed).or(base.seed),
        max_iterations: args
            .max_iterations
            .or(annealing_file.max_iterations)
            .or(base.max_iterations),
        progress_interval_ms: server_file
            .progress_interval_ms
            .unwrap_or(defaults.progress_interval_ms),
    };
    let annealing = AnnealingParamsBuilder::from_params(annealing)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let base = defaults.scoring;
    let scoring = ScoringParams {
        supercharge_multiplier: scoring_file
            .supercharge_multiplier
            .unwrap_or(base.supercharge_multiplier),
        cross_weight: scoring_file.cross_weight.unwrap_or(base.cross_weight),
        linear_weight: scoring_file.linear_weight.unwrap_or(base.linear_weight),
        lesser_weight: scoring_file.lesser_weight.unwrap_or(base.lesser_weight),
    };
    scoring
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let server = ServerSettings {
        bind: bind
            .map(str::to_string)
            .or(server_file.bind)
            .unwrap_or(defaults.bind),
        progress_buffer: server_file
            .progress_buffer
            .unwrap_or(defaults.progress_buffer),
    };
    if server.progress_buffer == 0 {
        return Err(CliError::Config(
            "`server.progress-buffer` must be at least 1".to_string(),
        ));
    }

    let config = AppConfig {
        catalog_path: args.catalog.clone().or(file_config.catalog_path),
        annealing,
        scoring,
        server,
    };
    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();
        let value_str = value_str.trim();

        match key {
            "catalog-path" => config.catalog_path = Some(value_str.into()),
            "annealing.initial-temperature" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .initial_temperature = Some(parse_value(key, value_str, "float")?);
            }
            "annealing.cooling-rate" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .cooling_rate = Some(parse_value(key, value_str, "float")?);
            }
            "annealing.stopping-temperature" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .stopping_temperature = Some(parse_value(key, value_str, "float")?);
            }
            "annealing.iterations-per-temp" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .iterations_per_temperature_step =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "annealing.initial-swap-probability" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .initial_swap_probability = Some(parse_value(key, value_str, "float")?);
            }
            "annealing.final-swap-probability" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .final_swap_probability = Some(parse_value(key, value_str, "float")?);
            }
            "annealing.start-from-current-grid" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .start_from_current_grid = Some(parse_value(key, value_str, "boolean")?);
            }
            "annealing.max-processing-time" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .max_processing_time = Some(parse_value(key, value_str, "float")?);
            }
            "annealing.max-steps-without-improvement" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .max_steps_without_improvement = Some(parse_value(key, value_str, "integer")?);
            }
            "annealing.reheat-factor" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .reheat_factor = Some(parse_value(key, value_str, "float")?);
            }
            "annealing.seed" => {
                config.annealing.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "annealing.max-iterations" => {
                config
                    .annealing
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse_value(key, value_str, "integer")?);
            }
            "scoring.supercharge-multiplier" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .supercharge_multiplier = Some(parse_value(key, value_str, "float")?);
            }
            "scoring.cross-weight" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .cross_weight = Some(parse_value(key, value_str, "float")?);
            }
            "scoring.linear-weight" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .linear_weight = Some(parse_value(key, value_str, "float")?);
            }
            "scoring.lesser-weight" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .lesser_weight = Some(parse_value(key, value_str, "float")?);
            }
            "server.bind" => {
                config.server.get_or_insert_with(Default::default).bind =
                    Some(value_str.to_string());
            }
            "server.progress-interval-ms" => {
                config
                    .server
                    .get_or_insert_with(Default::default)
                    .progress_interval_ms = Some(parse_value(key, value_str, "integer")?);
            }
            "server.progress-buffer" => {
                config
                    .server
                    .get_or_insert_with(Default::default)
                    .progress_buffer = Some(parse_value(key, value_str, "integer")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
