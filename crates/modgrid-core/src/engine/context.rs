use super::cancel::CancellationToken;
use super::config::AnnealingParams;
use super::progress::ProgressReporter;
use crate::core::scoring::Scorer;

/// Everything a search run reads but never owns.
#[derive(Clone, Copy)]
pub struct AnnealingContext<'a> {
    pub params: &'a AnnealingParams,
    pub scorer: Scorer<'a>,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: &'a CancellationToken,
}

impl<'a> AnnealingContext<'a> {
    pub fn new(
        params: &'a AnnealingParams,
        scorer: Scorer<'a>,
        reporter: &'a ProgressReporter<'a>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            params,
            scorer,
            reporter,
            cancel,
        }
    }
}
