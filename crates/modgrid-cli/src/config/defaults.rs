use modgrid::core::scoring::ScoringParams;
use modgrid::engine::config::AnnealingParams;

pub struct DefaultsConfig {
    pub bind: String,
    pub progress_interval_ms: u64,
    pub progress_buffer: usize,
    pub annealing: AnnealingParams,
    pub scoring: ScoringParams,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let annealing = AnnealingParams::default();
        Self {
            bind: "127.0.0.1:7878".to_string(),
            progress_interval_ms: annealing.progress_interval_ms,
            progress_buffer: 64,
            annealing,
            scoring: ScoringParams::default(),
        }
    }
}
