//! Progress reporting for the removal queue
//!
//! The queue calls into a [`ProgressReporter`] at round boundaries and after
//! every attempt so callers can log, render or record progress without the
//! queue knowing how.

use crate::classification::RemovalError;
use crate::queue::AttemptState;
use tracing::{debug, info, warn};

/// Counts for one finished round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoundSummary {
    pub round: u32,
    pub attempted: usize,
    pub removed: usize,
    pub retryable: usize,
    pub terminal: usize,
}

impl RoundSummary {
    /// A round progressed if it removed something or settled a failure
    pub fn made_progress(&self) -> bool {
        self.removed > 0 || self.terminal > 0
    }
}

/// One finished attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptUpdate {
    pub round: u32,
    pub kind: String,
    pub region: String,
    pub resource: String,
    pub state: AttemptState,
    pub error: Option<RemovalError>,
}

/// Receives queue progress events
#[cfg_attr(test, mockall::automock)]
pub trait ProgressReporter: Send + Sync {
    /// A round is about to dispatch `pending` attempts
    fn round_started(&self, round: u32, pending: usize);

    /// An attempt reached its end-of-round state
    fn attempt_finished(&self, update: AttemptUpdate);

    /// Every attempt of the round has finished
    fn round_finished(&self, summary: RoundSummary);
}

/// Reporter that writes progress to the tracing log
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for LogReporter {
    fn round_started(&self, round: u32, pending: usize) {
        info!(round, pending, "Starting removal round");
    }

    fn attempt_finished(&self, update: AttemptUpdate) {
        match (&update.state, &update.error) {
            (AttemptState::Removed, _) => {
                info!(
                    kind = %update.kind,
                    region = %update.region,
                    resource = %update.resource,
                    "Removed"
                );
            }
            (state, Some(e)) if state.is_terminal() => {
                warn!(
                    kind = %update.kind,
                    region = %update.region,
                    resource = %update.resource,
                    state = %state,
                    error = %e,
                    "Removal failed"
                );
            }
            (state, error) => {
                debug!(
                    kind = %update.kind,
                    region = %update.region,
                    resource = %update.resource,
                    state = %state,
                    error = ?error.as_ref().map(|e| e.message.as_str()),
                    "Removal will be retried"
                );
            }
        }
    }

    fn round_finished(&self, summary: RoundSummary) {
        info!(
            round = summary.round,
            attempted = summary.attempted,
            removed = summary.removed,
            retryable = summary.retryable,
            terminal = summary.terminal,
            "Round finished"
        );
    }
}

/// Reporter that discards every event
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn round_started(&self, _round: u32, _pending: usize) {}

    fn attempt_finished(&self, _update: AttemptUpdate) {}

    fn round_finished(&self, _summary: RoundSummary) {}
}
