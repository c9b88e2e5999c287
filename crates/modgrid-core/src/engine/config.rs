use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Parameter '{parameter}' = {value} is out of range: expected {expected}")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        expected: &'static str,
    },
}

fn default_progress_interval_ms() -> u64 {
    250
}

/// Simulated annealing schedule and budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealingParams {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub stopping_temperature: f64,
    #[serde(rename = "iterations_per_temp", alias = "iterations_per_temperature_step")]
    pub iterations_per_temperature_step: usize,
    pub initial_swap_probability: f64,
    pub final_swap_probability: f64,
    pub start_from_current_grid: bool,
    /// Wall-clock budget in seconds.
    pub max_processing_time: f64,
    /// Stagnation budget before a reheat. Zero disables reheating.
    pub max_steps_without_improvement: usize,
    pub reheat_factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Deterministic step budget. A run capped by steps rather than by the
    /// clock replays identically for a given seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        Self {
            initial_temperature: 1.0,
            cooling_rate: 0.95,
            stopping_temperature: 1e-3,
            iterations_per_temperature_step: 5,
            initial_swap_probability: 0.6,
            final_swap_probability: 0.1,
            start_from_current_grid: false,
            max_processing_time: 5.0,
            max_steps_without_improvement: 50,
            reheat_factor: 0.2,
            seed: None,
            max_iterations: None,
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl AnnealingParams {
    /// Wall-clock budget. Values too large for a `Duration` saturate.
    pub fn time_budget(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_processing_time).unwrap_or(
            if self.max_processing_time > 0.0 {
                Duration::MAX
            } else {
                Duration::ZERO
            },
        )
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Swap probability at `temperature`, interpolated on a log-temperature scale.
    pub fn swap_probability(&self, temperature: f64) -> f64 {
        let fraction = self.cooling_fraction(temperature);
        self.initial_swap_probability
            + (self.final_swap_probability - self.initial_swap_probability) * fraction
    }

    /// How far `temperature` has cooled from the initial towards the stopping
    /// temperature, in `[0, 1]`.
    pub fn cooling_fraction(&self, temperature: f64) -> f64 {
        let span = (self.initial_temperature / self.stopping_temperature).ln();
        if span <= 0.0 || temperature <= 0.0 {
            return 1.0;
        }
        ((self.initial_temperature / temperature).ln() / span).clamp(0.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(
            parameter: &'static str,
            value: f64,
            ok: bool,
            expected: &'static str,
        ) -> Result<(), ConfigError> {
            if ok && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    parameter,
                    value,
                    expected,
                })
            }
        }

        check(
            "initial_temperature",
            self.initial_temperature,
            self.initial_temperature > 0.0,
            "> 0",
        )?;
        check(
            "cooling_rate",
            self.cooling_rate,
            self.cooling_rate > 0.0 && self.cooling_rate < 1.0,
            "0 < rate < 1",
        )?;
        check(
            "stopping_temperature",
            self.stopping_temperature,
            self.stopping_temperature > 0.0
                && self.stopping_temperature < self.initial_temperature,
            "0 < stopping < initial_temperature",
        )?;
        check(
            "iterations_per_temp",
            self.iterations_per_temperature_step as f64,
            self.iterations_per_temperature_step > 0,
            ">= 1",
        )?;
        check(
            "initial_swap_probability",
            self.initial_swap_probability,
            (0.0..=1.0).contains(&self.initial_swap_probability),
            "0 <= p <= 1",
        )?;
        check(
            "final_swap_probability",
            self.final_swap_probability,
            (0.0..=1.0).contains(&self.final_swap_probability),
            "0 <= p <= 1",
        )?;
        check(
            "max_processing_time",
            self.max_processing_time,
            self.max_processing_time > 0.0
                && Duration::try_from_secs_f64(self.max_processing_time).is_ok(),
            "> 0 seconds and representable as a duration",
        )?;
        check(
            "reheat_factor",
            self.reheat_factor,
            self.reheat_factor > 0.0 && self.reheat_factor <= 1.0,
            "0 < factor <= 1",
        )?;
        if let Some(max) = self.max_iterations {
            check("max_iterations", max as f64, max > 0, ">= 1")?;
        }
        Ok(())
    }
}

/// Builds [`AnnealingParams`] on top of the defaults, validating on `build`.
#[derive(Default)]
pub struct AnnealingParamsBuilder {
    params: AnnealingParams,
}

impl AnnealingParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: AnnealingParams) -> Self {
        Self { params }
    }

    pub fn initial_temperature(mut self, t: f64) -> Self {
        self.params.initial_temperature = t;
        self
    }
    pub fn cooling_rate(mut self, rate: f64) -> Self {
        self.params.cooling_rate = rate;
        self
    }
    pub fn stopping_temperature(mut self, t: f64) -> Self {
        self.params.stopping_temperature = t;
        self
    }
    pub fn iterations_per_temperature_step(mut self, n: usize) -> Self {
        self.params.iterations_per_temperature_step = n;
        self
    }
    pub fn swap_probabilities(mut self, initial: f64, final_: f64) -> Self {
        self.params.initial_swap_probability = initial;
        self.params.final_swap_probability = final_;
        self
    }
    pub fn start_from_current_grid(mut self, yes: bool) -> Self {
        self.params.start_from_current_grid = yes;
        self
    }
    pub fn max_processing_time(mut self, seconds: f64) -> Self {
        self.params.max_processing_time = seconds;
        self
    }
    pub fn max_steps_without_improvement(mut self, steps: usize) -> Self {
        self.params.max_steps_without_improvement = steps;
        self
    }
    pub fn reheat_factor(mut self, factor: f64) -> Self {
        self.params.reheat_factor = factor;
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.params.seed = Some(seed);
        self
    }
    pub fn max_iterations(mut self, steps: u64) -> Self {
        self.params.max_iterations = Some(steps);
        self
    }
    pub fn progress_interval_ms(mut self, ms: u64) -> Self {
        self.params.progress_interval_ms = ms;
        self
    }

    pub fn build(self) -> Result<AnnealingParams, ConfigError> {
        self.params.validate()?;
        Ok(self.params)
    }
}
