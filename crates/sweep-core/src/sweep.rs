//! End-to-end sweep: discover, filter, remove, report

use crate::config::CompiledConfig;
use crate::error::RunError;
use crate::filter::Disposition;
use crate::progress::{LogReporter, ProgressReporter};
use crate::queue::RemovalQueue;
use crate::registry::{ListerRegistry, Sessions, discover};
use crate::report::RunReport;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Run-time switches that do not come from the config file
pub struct SweepOptions {
    /// Discover and filter only
    pub dry_run: bool,
    pub reporter: Arc<dyn ProgressReporter>,
    pub cancel: CancellationToken,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            reporter: Arc::new(LogReporter::new()),
            cancel: CancellationToken::new(),
        }
    }
}

/// Discover every selected type, filter, and drive the candidates to a
/// terminal state.
///
/// Only a registry/config mismatch or a total discovery failure aborts the
/// run; everything else ends up in the report.
pub async fn run_sweep<S: Sync>(
    registry: &ListerRegistry<S>,
    sessions: &Sessions<S>,
    config: &CompiledConfig,
    options: SweepOptions,
) -> Result<RunReport, RunError> {
    let entries = registry.select(&config.resource_types)?;
    info!(
        types = entries.len(),
        regions = sessions.regional.len(),
        "Starting discovery"
    );

    let discovery = discover(&entries, sessions, config.queue.concurrency).await;
    if discovery.all_failed() {
        return Err(RunError::DiscoveryFailed(discovery.calls));
    }

    let mut report = RunReport::new(options.dry_run);
    report.record_discovery_errors(discovery.errors);

    let mut candidates = Vec::new();
    for discovered in discovery.resources {
        match config
            .filters
            .evaluate(&discovered.kind, discovered.resource.as_ref())
        {
            Disposition::Included => candidates.push(discovered),
            Disposition::Excluded(reason) => {
                debug!(
                    kind = %discovered.kind,
                    region = %discovered.region,
                    resource = %discovered.identify(),
                    reason = %reason,
                    "Excluded"
                );
                report.record_excluded(&discovered, reason);
            }
        }
    }

    info!(
        candidates = candidates.len(),
        excluded = report.excluded.len(),
        "Filtering complete"
    );

    if options.dry_run {
        for candidate in &candidates {
            report.record_would_remove(candidate);
        }
        return Ok(report);
    }

    let outcome = RemovalQueue::new(config.queue.clone())
        .with_feature_flags(config.feature_flags.clone())
        .with_reporter(options.reporter)
        .with_cancellation(options.cancel)
        .run(candidates)
        .await;

    report.record_outcome(&outcome);
    Ok(report)
}
