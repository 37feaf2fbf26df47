//! Removal queue
//!
//! Drives every candidate to a terminal state without knowing anything about
//! the order resources have to be deleted in. Each round attempts every
//! pending record once, with bounded concurrency. Whatever failed retryably
//! is tried again next round, so dependents removed in round `n` unblock
//! their dependencies in round `n + 1`. The loop stops when nothing is
//! pending (converged), the round budget runs out, or the run is cancelled.

use crate::classification::{Classification, Precondition, RemovalError};
use crate::config::FeatureFlags;
use crate::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_INTER_ROUND_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_INTER_ROUND_DELAY_MS, DEFAULT_MAX_ROUNDS,
};
use crate::progress::{AttemptUpdate, LogReporter, ProgressReporter, RoundSummary};
use crate::resource::Discovered;
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use futures::future::{self, Either};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Removal engine knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Rounds before remaining records are forced to `Exhausted`
    pub max_rounds: u32,
    /// Attempts per record before a retryable failure becomes `Exhausted`
    pub max_attempts: u32,
    /// Concurrent attempts within a round
    pub concurrency: usize,
    /// Base delay after a round that made no progress
    pub inter_round_delay: Duration,
    /// Cap for the exponential inter-round delay
    pub max_inter_round_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            concurrency: DEFAULT_CONCURRENCY,
            inter_round_delay: Duration::from_millis(DEFAULT_INTER_ROUND_DELAY_MS),
            max_inter_round_delay: Duration::from_millis(DEFAULT_MAX_INTER_ROUND_DELAY_MS),
        }
    }
}

impl QueueConfig {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.inter_round_delay)
            .with_max_delay(self.max_inter_round_delay)
            .with_factor(2.0)
            .with_jitter()
            .without_max_times()
            .build()
    }
}

/// Why a record ended in a terminal failure
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TerminalCause {
    /// The provider refused the removal
    Rejected,
    /// Attempt or round budget used up
    Exhausted,
    /// The run was cancelled first
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Will be requeued next round
    Retryable,
    /// Absorbing
    Terminal(TerminalCause),
}

/// Lifecycle of one attempt record.
///
/// ```text
/// Pending -> Removing -> Removed
///                     -> Failed(Retryable) -> Pending
///                     -> Failed(Terminal)
/// ```
///
/// `Pending` and `Failed(Retryable)` can also be forced to
/// `Failed(Terminal)` when the run is cancelled or out of rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttemptState {
    #[default]
    Pending,
    Removing,
    Removed,
    Failed(Failure),
}

impl AttemptState {
    /// Removed or terminally failed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Removed | AttemptState::Failed(Failure::Terminal(_))
        )
    }

    pub fn terminal_cause(&self) -> Option<TerminalCause> {
        match self {
            AttemptState::Failed(Failure::Terminal(cause)) => Some(*cause),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: AttemptState) -> bool {
        use AttemptState::*;
        match (self, next) {
            (Pending, Removing) => true,
            (Removing, Removed | Failed(_)) => true,
            (Failed(Failure::Retryable), Pending) => true,
            (
                Pending | Failed(Failure::Retryable),
                Failed(Failure::Terminal(TerminalCause::Exhausted | TerminalCause::Cancelled)),
            ) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptState::Pending => f.write_str("pending"),
            AttemptState::Removing => f.write_str("removing"),
            AttemptState::Removed => f.write_str("removed"),
            AttemptState::Failed(Failure::Retryable) => f.write_str("failed (retryable)"),
            AttemptState::Failed(Failure::Terminal(cause)) => write!(f, "failed ({cause})"),
        }
    }
}

/// Per-resource state owned by the queue for the duration of a run
#[derive(Debug)]
pub struct AttemptRecord {
    /// Position in the candidate list
    pub id: usize,
    pub discovered: Discovered,
    /// Cached `identify()` output
    pub identity: String,
    pub rounds_attempted: u32,
    pub last_error: Option<RemovalError>,
    state: AttemptState,
}

impl AttemptRecord {
    pub fn new(id: usize, discovered: Discovered) -> Self {
        let identity = discovered.identify();
        Self {
            id,
            discovered,
            identity,
            rounds_attempted: 0,
            last_error: None,
            state: AttemptState::Pending,
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn kind(&self) -> &str {
        &self.discovered.kind
    }

    pub fn region(&self) -> &str {
        &self.discovered.region
    }

    fn transition(&mut self, next: AttemptState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {} for {}",
            self.state,
            next,
            self.identity
        );
        self.state = next;
    }
}

/// Final state of every record plus run-level facts
#[derive(Debug)]
pub struct QueueOutcome {
    /// Records ordered by candidate position
    pub records: Vec<AttemptRecord>,
    /// Rounds actually started
    pub rounds: u32,
    /// Nothing was left pending when the loop stopped
    pub converged: bool,
    pub cancelled: bool,
}

impl QueueOutcome {
    pub fn removed(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.records
            .iter()
            .filter(|r| r.state() == AttemptState::Removed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.records
            .iter()
            .filter(|r| r.state().terminal_cause().is_some())
    }
}

/// The removal engine
pub struct RemovalQueue {
    config: QueueConfig,
    flags: FeatureFlags,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl RemovalQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            flags: FeatureFlags::default(),
            reporter: Arc::new(LogReporter::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_feature_flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive every candidate to a terminal state
    pub async fn run(&self, candidates: Vec<Discovered>) -> QueueOutcome {
        let mut records: Vec<AttemptRecord> = candidates
            .into_iter()
            .enumerate()
            .map(|(id, discovered)| AttemptRecord::new(id, discovered))
            .collect();

        let mut round = 0u32;
        let mut delays = self.config.backoff();

        let (converged, cancelled) = loop {
            for record in records
                .iter_mut()
                .filter(|r| r.state == AttemptState::Failed(Failure::Retryable))
            {
                record.transition(AttemptState::Pending);
            }

            let pending = records
                .iter()
                .filter(|r| r.state == AttemptState::Pending)
                .count();
            if pending == 0 {
                // Records cancelled before dispatch mean the run did not converge
                let skipped = records
                    .iter()
                    .any(|r| r.state.terminal_cause() == Some(TerminalCause::Cancelled));
                break (!skipped, skipped);
            }

            if self.cancel.is_cancelled() {
                warn!(remaining = pending, "Removal cancelled");
                self.force_remaining(&mut records, TerminalCause::Cancelled);
                break (false, true);
            }

            if round >= self.config.max_rounds {
                warn!(
                    remaining = pending,
                    max_rounds = self.config.max_rounds,
                    "Round budget exhausted"
                );
                self.force_remaining(&mut records, TerminalCause::Exhausted);
                break (false, false);
            }

            round += 1;
            self.reporter.round_started(round, pending);

            let (batch, mut settled): (Vec<_>, Vec<_>) = records
                .into_iter()
                .partition(|r| r.state == AttemptState::Pending);

            // Round barrier: every attempt finishes before the round is evaluated.
            // Cancellation is checked as each record is dispatched, so records
            // not started yet never reach the provider.
            let finished: Vec<AttemptRecord> = stream::iter(batch)
                .map(|mut record| {
                    if self.cancel.is_cancelled() {
                        record.transition(AttemptState::Failed(Failure::Terminal(
                            TerminalCause::Cancelled,
                        )));
                        Either::Left(future::ready(record))
                    } else {
                        Either::Right(self.attempt(round, record))
                    }
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

            let summary = summarize(round, &finished);
            settled.extend(finished);
            settled.sort_by_key(|r| r.id);
            records = settled;

            self.reporter.round_finished(summary);

            if summary.made_progress() {
                delays = self.config.backoff();
            } else if round < self.config.max_rounds {
                let delay = delays.next().unwrap_or(self.config.max_inter_round_delay);
                debug!(round, delay_ms = delay.as_millis(), "No progress, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {
                        debug!(round, "Backoff interrupted by cancellation");
                    }
                }
            }
        };

        info!(rounds = round, converged, cancelled, "Removal finished");

        QueueOutcome {
            records,
            rounds: round,
            converged,
            cancelled,
        }
    }

    fn force_remaining(&self, records: &mut [AttemptRecord], cause: TerminalCause) {
        for record in records.iter_mut().filter(|r| !r.state.is_terminal()) {
            record.transition(AttemptState::Failed(Failure::Terminal(cause)));
        }
    }

    /// One attempt; owns the record until it is handed back
    async fn attempt(&self, round: u32, mut record: AttemptRecord) -> AttemptRecord {
        record.transition(AttemptState::Removing);
        record.rounds_attempted += 1;

        let next = match self.remove(&record).await {
            Ok(()) => AttemptState::Removed,
            Err(e) => {
                let next = match e.classification {
                    Classification::NotFound => AttemptState::Removed,
                    Classification::Retryable if record.rounds_attempted >= self.config.max_attempts => {
                        AttemptState::Failed(Failure::Terminal(TerminalCause::Exhausted))
                    }
                    Classification::Retryable => AttemptState::Failed(Failure::Retryable),
                    Classification::Terminal | Classification::RequiresPrecondition(_) => {
                        AttemptState::Failed(Failure::Terminal(TerminalCause::Rejected))
                    }
                };
                record.last_error = Some(e);
                next
            }
        };
        record.transition(next);

        self.reporter.attempt_finished(AttemptUpdate {
            round,
            kind: record.kind().to_string(),
            region: record.region().to_string(),
            resource: record.identity.clone(),
            state: record.state,
            error: record.last_error.clone().filter(|_| next != AttemptState::Removed),
        });

        record
    }

    /// Settle, remove, and run an authorized precondition at most once
    async fn remove(&self, record: &AttemptRecord) -> Result<(), RemovalError> {
        let resource = record.discovered.resource.as_ref();

        if let Some(settle) = resource.settle() {
            settle.settle().await?;
        }

        let err = match resource.remove().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let Some(step) = err.precondition() else {
            return Err(err);
        };

        self.satisfy_and_retry(record, step, err).await
    }

    async fn satisfy_and_retry(
        &self,
        record: &AttemptRecord,
        step: Precondition,
        cause: RemovalError,
    ) -> Result<(), RemovalError> {
        let kind = record.kind();
        if !self.flags.authorizes(kind, step) {
            return Err(RemovalError {
                message: format!(
                    "{}; set feature flag '{step}' for {kind} to allow it",
                    cause.message
                ),
                ..cause.into_terminal()
            });
        }

        info!(
            kind = %kind,
            resource = %record.identity,
            precondition = %step,
            "Running precondition before retrying removal"
        );
        record.discovered.resource.satisfy(step).await?;

        match record.discovered.resource.remove().await {
            Err(e) if e.precondition().is_some() => Err(e.into_terminal()),
            other => other,
        }
    }
}

/// Records cancelled before dispatch were never attempted and are left out
fn summarize(round: u32, finished: &[AttemptRecord]) -> RoundSummary {
    finished.iter().fold(
        RoundSummary {
            round,
            ..Default::default()
        },
        |mut summary, record| {
            match record.state {
                AttemptState::Removed => summary.removed += 1,
                AttemptState::Failed(Failure::Retryable) => summary.retryable += 1,
                AttemptState::Failed(Failure::Terminal(TerminalCause::Cancelled)) => {
                    return summary;
                }
                AttemptState::Failed(Failure::Terminal(_)) => summary.terminal += 1,
                AttemptState::Pending | AttemptState::Removing => {}
            }
            summary.attempted += 1;
            summary
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{MockProgressReporter, NoopReporter};
    use crate::resource::{Resource, Settle};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Resource whose remove outcomes are scripted; the last one repeats
    struct Scripted {
        id: String,
        outcomes: Mutex<VecDeque<Result<(), RemovalError>>>,
        removes: AtomicU32,
        satisfied: AtomicU32,
        settle_error: Option<RemovalError>,
    }

    impl Scripted {
        fn new(id: &str, outcomes: Vec<Result<(), RemovalError>>) -> Self {
            Self {
                id: id.to_string(),
                outcomes: Mutex::new(outcomes.into()),
                removes: AtomicU32::new(0),
                satisfied: AtomicU32::new(0),
                settle_error: None,
            }
        }
    }

    #[async_trait]
    impl Resource for Scripted {
        fn identify(&self) -> String {
            self.id.clone()
        }

        async fn remove(&self) -> Result<(), RemovalError> {
            self.removes.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.pop_front().unwrap()
            } else {
                outcomes.front().cloned().unwrap_or(Ok(()))
            }
        }

        fn settle(&self) -> Option<&dyn Settle> {
            self.settle_error.as_ref().map(|_| self as &dyn Settle)
        }

        async fn satisfy(&self, _precondition: Precondition) -> Result<(), RemovalError> {
            self.satisfied.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Settle for Scripted {
        async fn settle(&self) -> Result<(), RemovalError> {
            match &self.settle_error {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    fn fast_config() -> QueueConfig {
        QueueConfig {
            max_rounds: 5,
            max_attempts: 5,
            concurrency: 4,
            inter_round_delay: Duration::ZERO,
            max_inter_round_delay: Duration::ZERO,
        }
    }

    fn queue(config: QueueConfig) -> RemovalQueue {
        RemovalQueue::new(config).with_reporter(Arc::new(NoopReporter))
    }

    fn candidate(resource: Scripted) -> Discovered {
        Discovered::new("TestKind", "us-east-1", Box::new(resource))
    }

    fn protected() -> RemovalError {
        RemovalError::requires(Precondition::DisableDeletionProtection, "deletion protection enabled")
    }

    #[test]
    fn test_transitions() {
        use AttemptState::*;
        let exhausted = Failed(Failure::Terminal(TerminalCause::Exhausted));
        let rejected = Failed(Failure::Terminal(TerminalCause::Rejected));

        assert!(Pending.can_transition_to(Removing));
        assert!(Removing.can_transition_to(Removed));
        assert!(Removing.can_transition_to(rejected));
        assert!(Failed(Failure::Retryable).can_transition_to(Pending));
        assert!(Pending.can_transition_to(exhausted));

        assert!(!Removed.can_transition_to(Pending));
        assert!(!exhausted.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Removed));
        assert!(!Pending.can_transition_to(rejected));
        assert!(!Removing.can_transition_to(Removing));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(AttemptState::Removed.to_string(), "removed");
        assert_eq!(
            AttemptState::Failed(Failure::Terminal(TerminalCause::Cancelled)).to_string(),
            "failed (cancelled)"
        );
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let outcome = queue(fast_config())
            .run(vec![candidate(Scripted::new(
                "sg-1",
                vec![Err(RemovalError::retryable("DependencyViolation")), Ok(())],
            ))])
            .await;

        assert!(outcome.converged);
        assert_eq!(outcome.rounds, 2);
        let record = &outcome.records[0];
        assert_eq!(record.state(), AttemptState::Removed);
        assert_eq!(record.rounds_attempted, 2);
        assert_eq!(
            record.last_error.as_ref().map(|e| e.message.as_str()),
            Some("DependencyViolation")
        );
    }

    #[tokio::test]
    async fn test_terminal_is_not_retried() {
        let outcome = queue(fast_config())
            .run(vec![candidate(Scripted::new(
                "role",
                vec![Err(RemovalError::terminal("AccessDenied"))],
            ))])
            .await;

        assert!(outcome.converged);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(
            outcome.records[0].state().terminal_cause(),
            Some(TerminalCause::Rejected)
        );
        assert_eq!(outcome.records[0].rounds_attempted, 1);
    }

    #[tokio::test]
    async fn test_not_found_counts_as_removed() {
        let outcome = queue(fast_config())
            .run(vec![candidate(Scripted::new(
                "i-gone",
                vec![Err(RemovalError::not_found("InvalidInstanceID.NotFound"))],
            ))])
            .await;

        assert_eq!(outcome.removed().count(), 1);
        assert_eq!(outcome.failed().count(), 0);
    }

    #[tokio::test]
    async fn test_max_attempts_exhausts_before_rounds() {
        let config = QueueConfig {
            max_attempts: 2,
            ..fast_config()
        };
        let outcome = queue(config)
            .run(vec![candidate(Scripted::new(
                "vpc",
                vec![Err(RemovalError::retryable("DependencyViolation"))],
            ))])
            .await;

        // Exhaustion inside a round is a terminal state, so the loop converges
        assert!(outcome.converged);
        assert_eq!(outcome.rounds, 2);
        let record = &outcome.records[0];
        assert_eq!(record.rounds_attempted, 2);
        assert_eq!(record.state().terminal_cause(), Some(TerminalCause::Exhausted));
    }

    #[tokio::test]
    async fn test_round_budget_forces_exhaustion() {
        let config = QueueConfig {
            max_rounds: 3,
            max_attempts: 10,
            ..fast_config()
        };
        let outcome = queue(config)
            .run(vec![candidate(Scripted::new(
                "vpc",
                vec![Err(RemovalError::retryable("DependencyViolation"))],
            ))])
            .await;

        assert!(!outcome.converged);
        assert_eq!(outcome.rounds, 3);
        let record = &outcome.records[0];
        assert_eq!(record.rounds_attempted, 3);
        assert_eq!(record.state().terminal_cause(), Some(TerminalCause::Exhausted));
        assert!(record.last_error.is_some());
    }

    #[tokio::test]
    async fn test_authorized_precondition_runs_inline() {
        let flags = FeatureFlags::new().allow(Precondition::DisableDeletionProtection, "TestKind");
        let outcome = queue(fast_config())
            .with_feature_flags(flags)
            .run(vec![candidate(Scripted::new(
                "pool",
                vec![Err(protected()), Ok(())],
            ))])
            .await;

        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.records[0].state(), AttemptState::Removed);
        assert_eq!(outcome.records[0].rounds_attempted, 1);
    }

    #[tokio::test]
    async fn test_unauthorized_precondition_is_terminal() {
        let outcome = queue(fast_config())
            .run(vec![candidate(Scripted::new("pool", vec![Err(protected())]))])
            .await;

        let record = &outcome.records[0];
        assert_eq!(record.state().terminal_cause(), Some(TerminalCause::Rejected));
        let message = &record.last_error.as_ref().unwrap().message;
        assert!(message.contains("disable_deletion_protection"));
        assert!(message.contains("TestKind"));
    }

    #[tokio::test]
    async fn test_precondition_requested_twice_is_terminal() {
        let flags = FeatureFlags::new().allow(Precondition::DisableDeletionProtection, "TestKind");
        let resource = Scripted::new("pool", vec![Err(protected())]);
        let outcome = queue(fast_config())
            .with_feature_flags(flags)
            .run(vec![candidate(resource)])
            .await;

        let record = &outcome.records[0];
        assert_eq!(record.state().terminal_cause(), Some(TerminalCause::Rejected));
        assert_eq!(
            record.last_error.as_ref().unwrap().classification,
            Classification::Terminal
        );
    }

    #[tokio::test]
    async fn test_settle_failure_skips_remove() {
        let mut resource = Scripted::new("bucket", vec![Ok(())]);
        resource.settle_error = Some(RemovalError::terminal("AccessDenied on ListObjects"));

        let outcome = queue(fast_config()).run(vec![candidate(resource)]).await;

        let record = &outcome.records[0];
        assert_eq!(record.state().terminal_cause(), Some(TerminalCause::Rejected));
        assert_eq!(
            record.last_error.as_ref().unwrap().message,
            "AccessDenied on ListObjects"
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = queue(fast_config())
            .with_cancellation(cancel)
            .run(vec![candidate(Scripted::new("a", vec![Ok(())]))])
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.rounds, 0);
        assert_eq!(
            outcome.records[0].state().terminal_cause(),
            Some(TerminalCause::Cancelled)
        );
        assert_eq!(outcome.records[0].rounds_attempted, 0);
    }

    #[tokio::test]
    async fn test_empty_candidates_converge_immediately() {
        let outcome = queue(fast_config()).run(vec![]).await;
        assert!(outcome.converged);
        assert_eq!(outcome.rounds, 0);
    }

    #[tokio::test]
    async fn test_reporter_sees_every_round() {
        let mut reporter = MockProgressReporter::new();
        reporter
            .expect_round_started()
            .withf(|round, pending| (*round == 1 && *pending == 2) || (*round == 2 && *pending == 1))
            .times(2)
            .return_const(());
        reporter.expect_attempt_finished().times(3).return_const(());
        reporter
            .expect_round_finished()
            .withf(|s| s.attempted == if s.round == 1 { 2 } else { 1 })
            .times(2)
            .return_const(());

        let outcome = RemovalQueue::new(fast_config())
            .with_reporter(Arc::new(reporter))
            .run(vec![
                candidate(Scripted::new("a", vec![Ok(())])),
                candidate(Scripted::new(
                    "b",
                    vec![Err(RemovalError::retryable("Throttling")), Ok(())],
                )),
            ])
            .await;

        assert!(outcome.converged);
        assert_eq!(outcome.removed().count(), 2);
    }

    #[test]
    fn test_backoff_keeps_growing_past_three_rounds() {
        let config = QueueConfig {
            inter_round_delay: Duration::from_secs(5),
            max_inter_round_delay: Duration::from_secs(60),
            ..QueueConfig::default()
        };
        let delays: Vec<_> = config.backoff().take(6).collect();
        assert_eq!(delays.len(), 6);
        // 5s, 10s, 20s, 40s before jitter; the fourth idle round does not jump to the cap
        assert!(delays[3] >= Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_after_idle_round() {
        let config = QueueConfig {
            max_rounds: 2,
            inter_round_delay: Duration::from_secs(5),
            max_inter_round_delay: Duration::from_secs(60),
            ..fast_config()
        };
        let start = tokio::time::Instant::now();
        queue(config)
            .run(vec![candidate(Scripted::new(
                "vpc",
                vec![Err(RemovalError::retryable("DependencyViolation"))],
            ))])
            .await;

        // One idle round, then the last round which never sleeps
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_backoff_after_progress() {
        let config = QueueConfig {
            inter_round_delay: Duration::from_secs(30),
            max_inter_round_delay: Duration::from_secs(60),
            ..fast_config()
        };
        let start = tokio::time::Instant::now();
        queue(config)
            .run(vec![
                candidate(Scripted::new("a", vec![Ok(())])),
                candidate(Scripted::new(
                    "b",
                    vec![Err(RemovalError::retryable("DependencyViolation")), Ok(())],
                )),
            ])
            .await;

        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_backoff_short() {
        let cancel = CancellationToken::new();
        let config = QueueConfig {
            inter_round_delay: Duration::from_secs(600),
            max_inter_round_delay: Duration::from_secs(600),
            ..fast_config()
        };
        let q = queue(config).with_cancellation(cancel.clone());

        let trigger = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        };
        let (outcome, ()) = tokio::join!(
            q.run(vec![candidate(Scripted::new(
                "vpc",
                vec![Err(RemovalError::retryable("DependencyViolation"))],
            ))]),
            trigger
        );

        assert!(outcome.cancelled);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(
            outcome.records[0].state().terminal_cause(),
            Some(TerminalCause::Cancelled)
        );
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn outcome_strategy() -> impl Strategy<Value = Result<(), RemovalError>> {
            prop_oneof![
                3 => Just(Ok(())),
                4 => Just(Err(RemovalError::retryable("DependencyViolation"))),
                1 => Just(Err(RemovalError::terminal("AccessDenied"))),
                1 => Just(Err(RemovalError::not_found("NotFound"))),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn every_record_ends_terminal_within_budget(
                scripts in prop::collection::vec(prop::collection::vec(outcome_strategy(), 1..6), 0..8),
                max_rounds in 1u32..6,
                max_attempts in 1u32..6,
                concurrency in 1usize..4,
            ) {
                let config = QueueConfig {
                    max_rounds,
                    max_attempts,
                    concurrency,
                    inter_round_delay: Duration::ZERO,
                    max_inter_round_delay: Duration::ZERO,
                };
                let candidates: Vec<_> = scripts
                    .into_iter()
                    .enumerate()
                    .map(|(i, script)| candidate(Scripted::new(&format!("r{i}"), script)))
                    .collect();
                let count = candidates.len();

                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                let outcome = rt.block_on(queue(config).run(candidates));

                prop_assert_eq!(outcome.records.len(), count);
                prop_assert!(outcome.rounds <= max_rounds);
                for (i, record) in outcome.records.iter().enumerate() {
                    prop_assert_eq!(record.id, i);
                    prop_assert!(record.state().is_terminal());
                    prop_assert!(record.rounds_attempted <= max_attempts);
                    prop_assert!(record.rounds_attempted <= outcome.rounds);
                }
            }
        }
    }
}
