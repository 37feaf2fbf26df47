//! Scripted fake resources for engine tests
//!
//! A [`ScriptedResource`] replays a list of removal outcomes and records
//! what happened to it in a shared [`EventLog`]. A [`Probe`] bundles the log
//! with counters for concurrency and overlapping attempts so tests can check
//! round barriers and the concurrency limit after a run.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sweep_core::queue::AttemptState;
use sweep_core::{
    AttemptUpdate, Lister, Precondition, ProgressReporter, Properties, RemovalError, Resource,
    RoundSummary,
};

/// Something observed during a run
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RoundStarted { round: u32, pending: usize },
    RemoveStarted { resource: String },
    RemoveEnded { resource: String },
    Satisfied { resource: String, precondition: Precondition },
    AttemptFinished { round: u32, resource: String, state: AttemptState },
    RoundFinished(RoundSummary),
}

/// Append-only event log shared between resources and the reporter
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Number of `remove` calls made on a resource
    pub fn removes_of(&self, resource: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::RemoveStarted { resource: r } if r == resource))
            .count()
    }

    /// Rounds in which a resource was attempted, with the state it ended in
    pub fn attempts_of(&self, resource: &str) -> Vec<(u32, AttemptState)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::AttemptFinished {
                    round,
                    resource: r,
                    state,
                } if r == resource => Some((round, state)),
                _ => None,
            })
            .collect()
    }

    /// Check that every remove call happened between its round's start and
    /// finish markers, and that rounds never overlap.
    pub fn rounds_are_barriers(&self) -> bool {
        let mut open: Option<u32> = None;
        let mut in_flight = 0usize;
        for event in self.events() {
            match event {
                Event::RoundStarted { round, .. } => {
                    if open.is_some() {
                        return false;
                    }
                    open = Some(round);
                }
                Event::RemoveStarted { .. } => {
                    if open.is_none() {
                        return false;
                    }
                    in_flight += 1;
                }
                Event::RemoveEnded { .. } => in_flight = in_flight.saturating_sub(1),
                Event::RoundFinished(summary) => {
                    if open != Some(summary.round) || in_flight != 0 {
                        return false;
                    }
                    open = None;
                }
                Event::Satisfied { .. } | Event::AttemptFinished { .. } => {}
            }
        }
        open.is_none()
    }
}

/// Tracks the highest number of simultaneous remove calls
#[derive(Debug, Default)]
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyTracker {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Shared observation points for a test run
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub log: EventLog,
    pub concurrency: Arc<ConcurrencyTracker>,
    /// Times a resource saw a second remove call while one was in flight
    pub overlaps: Arc<AtomicUsize>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reporter(&self) -> Arc<RecordingReporter> {
        Arc::new(RecordingReporter {
            log: self.log.clone(),
        })
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

type RemoveHook = Box<dyn Fn(u32) + Send + Sync>;

/// Fake resource that replays scripted outcomes.
///
/// Each `remove` call takes the next outcome; the last one repeats forever.
/// An empty script always succeeds.
pub struct ScriptedResource {
    id: String,
    properties: Properties,
    builtin_filter: Option<String>,
    script: Mutex<VecDeque<Result<(), RemovalError>>>,
    delay: Duration,
    probe: Probe,
    in_flight: AtomicBool,
    calls: AtomicU32,
    on_remove: Option<RemoveHook>,
}

impl ScriptedResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: Properties::new(),
            builtin_filter: None,
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            probe: Probe::new(),
            in_flight: AtomicBool::new(false),
            calls: AtomicU32::new(0),
            on_remove: None,
        }
    }

    /// Outcomes for successive remove calls
    pub fn script(self, outcomes: Vec<Result<(), RemovalError>>) -> Self {
        *self.script.lock().unwrap() = outcomes.into();
        self
    }

    /// Fail retryably `n` times, then succeed
    pub fn fails_retryably(self, n: usize, message: &str) -> Self {
        let mut outcomes: Vec<_> = (0..n)
            .map(|_| Err(RemovalError::retryable(message)))
            .collect();
        outcomes.push(Ok(()));
        self.script(outcomes)
    }

    /// Always fail with the given error
    pub fn always(self, error: RemovalError) -> Self {
        self.script(vec![Err(error)])
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.set(key, value);
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.properties.set_tag(key, value);
        self
    }

    pub fn with_builtin_filter(mut self, reason: &str) -> Self {
        self.builtin_filter = Some(reason.to_string());
        self
    }

    /// Simulated latency of every remove call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn observed_by(mut self, probe: &Probe) -> Self {
        self.probe = probe.clone();
        self
    }

    /// Run a hook on every remove call, with the 1-based call number
    pub fn on_remove(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_remove = Some(Box::new(hook));
        self
    }

    pub fn boxed(self) -> Box<dyn Resource> {
        Box::new(self)
    }

    fn next_outcome(&self) -> Result<(), RemovalError> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap_or(Ok(()))
        } else {
            script.front().cloned().unwrap_or(Ok(()))
        }
    }
}

#[async_trait]
impl Resource for ScriptedResource {
    fn identify(&self) -> String {
        self.id.clone()
    }

    fn filter(&self) -> Option<String> {
        self.builtin_filter.clone()
    }

    async fn remove(&self) -> Result<(), RemovalError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.probe.concurrency.enter();
        self.probe.log.push(Event::RemoveStarted {
            resource: self.id.clone(),
        });

        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.on_remove {
            hook(call);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = self.next_outcome();

        self.probe.log.push(Event::RemoveEnded {
            resource: self.id.clone(),
        });
        self.probe.concurrency.exit();
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    fn properties(&self) -> Properties {
        self.properties.clone()
    }

    async fn satisfy(&self, precondition: Precondition) -> Result<(), RemovalError> {
        self.probe.log.push(Event::Satisfied {
            resource: self.id.clone(),
            precondition,
        });
        Ok(())
    }
}

/// Progress reporter that appends to an [`EventLog`]
pub struct RecordingReporter {
    log: EventLog,
}

impl ProgressReporter for RecordingReporter {
    fn round_started(&self, round: u32, pending: usize) {
        self.log.push(Event::RoundStarted { round, pending });
    }

    fn attempt_finished(&self, update: AttemptUpdate) {
        self.log.push(Event::AttemptFinished {
            round: update.round,
            resource: update.resource,
            state: update.state,
        });
    }

    fn round_finished(&self, summary: RoundSummary) {
        self.log.push(Event::RoundFinished(summary));
    }
}

/// Lister built from a closure over the session.
///
/// Tests use the region name as the session.
pub struct FnLister<F>(pub F);

#[async_trait]
impl<F> Lister<String> for FnLister<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<Box<dyn Resource>>> + Send + Sync,
{
    async fn list(&self, session: &String) -> anyhow::Result<Vec<Box<dyn Resource>>> {
        (self.0)(session)
    }
}
