//! Run report
//!
//! Collects removed, excluded and failed resources plus discovery errors
//! into one summary, rendered as a console table or written as JSON.

use crate::classification::RemovalError;
use crate::filter::ExclusionReason;
use crate::properties::Properties;
use crate::queue::{QueueOutcome, TerminalCause};
use crate::registry::DiscoveryError;
use crate::resource::Discovered;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// A resource that was (or would be) removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedEntry {
    pub kind: String,
    pub region: String,
    pub resource: String,
    /// Zero for dry-run candidates
    pub rounds_attempted: u32,
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedEntry {
    pub kind: String,
    pub region: String,
    pub resource: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub kind: String,
    pub region: String,
    pub resource: String,
    pub cause: TerminalCause,
    pub rounds_attempted: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<RemovalError>,
}

/// Final summary of a sweep
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub written_at: DateTime<Utc>,
    pub dry_run: bool,
    pub rounds: u32,
    pub converged: bool,
    pub cancelled: bool,
    pub removed: Vec<RemovedEntry>,
    /// Candidates a dry run would have attempted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub would_remove: Vec<RemovedEntry>,
    pub excluded: Vec<ExcludedEntry>,
    pub failed: Vec<FailedEntry>,
    pub discovery_errors: Vec<DiscoveryError>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            written_at: Utc::now(),
            dry_run,
            rounds: 0,
            converged: true,
            cancelled: false,
            removed: Vec::new(),
            would_remove: Vec::new(),
            excluded: Vec::new(),
            failed: Vec::new(),
            discovery_errors: Vec::new(),
        }
    }

    pub fn record_discovery_errors(&mut self, errors: Vec<DiscoveryError>) {
        self.discovery_errors.extend(errors);
    }

    pub fn record_excluded(&mut self, discovered: &Discovered, reason: ExclusionReason) {
        self.excluded.push(ExcludedEntry {
            kind: discovered.kind.clone(),
            region: discovered.region.clone(),
            resource: discovered.identify(),
            reason,
        });
    }

    /// Record a dry-run candidate
    pub fn record_would_remove(&mut self, discovered: &Discovered) {
        self.would_remove.push(RemovedEntry {
            kind: discovered.kind.clone(),
            region: discovered.region.clone(),
            resource: discovered.identify(),
            rounds_attempted: 0,
            properties: discovered.resource.properties(),
        });
    }

    /// Fold the queue's terminal records into the report
    pub fn record_outcome(&mut self, outcome: &QueueOutcome) {
        self.rounds = outcome.rounds;
        self.converged = outcome.converged;
        self.cancelled = outcome.cancelled;

        for record in &outcome.records {
            match record.state().terminal_cause() {
                Some(cause) => self.failed.push(FailedEntry {
                    kind: record.kind().to_string(),
                    region: record.region().to_string(),
                    resource: record.identity.clone(),
                    cause,
                    rounds_attempted: record.rounds_attempted,
                    last_error: record.last_error.clone(),
                }),
                None => self.removed.push(RemovedEntry {
                    kind: record.kind().to_string(),
                    region: record.region().to_string(),
                    resource: record.identity.clone(),
                    rounds_attempted: record.rounds_attempted,
                    properties: Properties::new(),
                }),
            }
        }
    }

    /// No terminal failures and no discovery errors
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.discovery_errors.is_empty()
    }

    pub fn failed_by(&self, cause: TerminalCause) -> usize {
        self.failed.iter().filter(|f| f.cause == cause).count()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report")
    }

    /// Write the report as JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report written");
        Ok(())
    }

    /// One line of counts, used as the table caption
    pub fn headline(&self) -> String {
        if self.dry_run {
            return format!(
                "Dry run: {} would be removed, {} excluded, {} discovery errors",
                self.would_remove.len(),
                self.excluded.len(),
                self.discovery_errors.len()
            );
        }
        format!(
            "{} removed, {} excluded, {} failed ({} rejected, {} exhausted, {} cancelled), \
             {} discovery errors, {} rounds{}",
            self.removed.len(),
            self.excluded.len(),
            self.failed.len(),
            self.failed_by(TerminalCause::Rejected),
            self.failed_by(TerminalCause::Exhausted),
            self.failed_by(TerminalCause::Cancelled),
            self.discovery_errors.len(),
            self.rounds,
            if self.converged { "" } else { " (did not converge)" }
        )
    }

    /// Build the per-resource table
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Type"),
                Cell::new("Region"),
                Cell::new("Resource"),
                Cell::new("Outcome"),
                Cell::new("Rounds"),
                Cell::new("Detail"),
            ]);

        for entry in &self.removed {
            table.add_row(vec![
                Cell::new(&entry.kind),
                Cell::new(&entry.region),
                Cell::new(&entry.resource),
                Cell::new("removed"),
                Cell::new(entry.rounds_attempted),
                Cell::new(""),
            ]);
        }

        for entry in &self.would_remove {
            table.add_row(vec![
                Cell::new(&entry.kind),
                Cell::new(&entry.region),
                Cell::new(&entry.resource),
                Cell::new("would remove"),
                Cell::new("-"),
                Cell::new(entry.properties.to_string()),
            ]);
        }

        for entry in &self.failed {
            table.add_row(vec![
                Cell::new(&entry.kind),
                Cell::new(&entry.region),
                Cell::new(&entry.resource),
                Cell::new(format!("failed ({})", entry.cause)),
                Cell::new(entry.rounds_attempted),
                Cell::new(entry.last_error.as_ref().map(|e| e.message.as_str()).unwrap_or("")),
            ]);
        }

        for entry in &self.excluded {
            table.add_row(vec![
                Cell::new(&entry.kind),
                Cell::new(&entry.region),
                Cell::new(&entry.resource),
                Cell::new("excluded"),
                Cell::new("-"),
                Cell::new(entry.reason.to_string()),
            ]);
        }

        for error in &self.discovery_errors {
            table.add_row(vec![
                Cell::new(&error.kind),
                Cell::new(&error.region),
                Cell::new("-"),
                Cell::new("discovery error"),
                Cell::new("-"),
                Cell::new(&error.message),
            ]);
        }

        table
    }

    /// Print the summary table to stdout
    pub fn print_summary(&self) {
        println!("\n=== Sweep Results ===\n");
        if self.removed.len()
            + self.would_remove.len()
            + self.failed.len()
            + self.excluded.len()
            + self.discovery_errors.len()
            > 0
        {
            println!("{}", self.table());
        }
        println!("\n{}", self.headline());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunReport {
        let mut report = RunReport::new(false);
        report.rounds = 3;
        report.removed.push(RemovedEntry {
            kind: "SecurityGroup".to_string(),
            region: "us-east-1".to_string(),
            resource: "sg-123".to_string(),
            rounds_attempted: 2,
            properties: Properties::new(),
        });
        report.failed.push(FailedEntry {
            kind: "Ec2Vpc".to_string(),
            region: "us-east-1".to_string(),
            resource: "vpc-1".to_string(),
            cause: TerminalCause::Exhausted,
            rounds_attempted: 3,
            last_error: Some(RemovalError::retryable("DependencyViolation").with_code("DependencyViolation")),
        });
        report
    }

    #[test]
    fn test_success_requires_no_failures_or_discovery_errors() {
        let mut report = RunReport::new(false);
        assert!(report.is_success());

        report.record_discovery_errors(vec![DiscoveryError {
            kind: "IamRole".to_string(),
            region: "global".to_string(),
            message: "AccessDenied".to_string(),
        }]);
        assert!(!report.is_success());

        assert!(!sample().is_success());
    }

    #[test]
    fn test_headline() {
        let report = sample();
        assert_eq!(
            report.headline(),
            "1 removed, 0 excluded, 1 failed (0 rejected, 1 exhausted, 0 cancelled), \
             0 discovery errors, 3 rounds"
        );

        let mut dry = RunReport::new(true);
        dry.would_remove.push(RemovedEntry {
            kind: "S3Bucket".to_string(),
            region: "us-east-2".to_string(),
            resource: "ci-artifacts".to_string(),
            rounds_attempted: 0,
            properties: Properties::new(),
        });
        assert_eq!(
            dry.headline(),
            "Dry run: 1 would be removed, 0 excluded, 0 discovery errors"
        );
    }

    #[test]
    fn test_table_contains_failure_detail() {
        let rendered = sample().table().to_string();
        assert!(rendered.contains("sg-123"));
        assert!(rendered.contains("failed (exhausted)"));
        assert!(rendered.contains("DependencyViolation"));
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["rounds"], 3);
        assert_eq!(json["failed"][0]["cause"], "exhausted");
        assert_eq!(json["failed"][0]["last_error"]["classification"], "retryable");
        assert_eq!(json["failed"][0]["last_error"]["code"], "DependencyViolation");
        assert!(json.get("would_remove").is_none());
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        sample().write_json(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("vpc-1"));
    }
}
