//! Scan result model
//!
//! A [`ScanAggregate`] is created empty when a scan starts and is filled by
//! concurrent check workers. Sealing it produces a [`ScanResult`], which has
//! no mutating API: reporting collaborators only read it.
//!
//! Findings are kept in the order the aggregator observed them. That order
//! depends on which worker finishes first and is not stable across runs;
//! only the set of findings is.

use crate::finding::{Finding, FindingKey};
use crate::severity::Severity;
use crate::target::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Terminal state of a scan that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Every dispatched check returned (successfully or with a recorded error)
    Completed,
    /// Cancelled by the caller or by the global scan timeout
    Cancelled,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Completed => "completed",
            ScanStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A check that failed without aborting the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckError {
    pub check_name: String,
    pub message: String,
}

impl CheckError {
    pub fn new(check_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.check_name, self.message)
    }
}

/// Finding tally per severity. Severities with no findings are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityCounts(BTreeMap<Severity, usize>);

impl SeverityCounts {
    pub fn from_findings<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> Self {
        let mut counts = BTreeMap::new();
        for finding in findings {
            *counts.entry(finding.severity).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, severity: Severity) -> usize {
        self.0.get(&severity).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-zero entries, lowest severity first
    pub fn iter(&self) -> impl Iterator<Item = (Severity, usize)> + '_ {
        self.0.iter().map(|(s, c)| (*s, *c))
    }
}

/// Sealed outcome of one scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    target: Target,
    status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancel_reason: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    findings: Vec<Finding>,
    severity_counts: SeverityCounts,
    errors: Vec<CheckError>,
    checks_run: Vec<String>,
    skipped_checks: Vec<String>,
    requests_sent: u64,
}

impl ScanResult {
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ScanStatus::Cancelled
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn duration(&self) -> std::time::Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Findings in aggregation order (not stable across runs)
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn severity_counts(&self) -> &SeverityCounts {
        &self.severity_counts
    }

    pub fn errors(&self) -> &[CheckError] {
        &self.errors
    }

    /// Checks that were dispatched, in dispatch order
    pub fn checks_run(&self) -> &[String] {
        &self.checks_run
    }

    /// Checks never dispatched because the scan was cancelled first
    pub fn skipped_checks(&self) -> &[String] {
        &self.skipped_checks
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    pub fn findings_for<'a>(&'a self, check_name: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings
            .iter()
            .filter(move |f| f.check_name == check_name)
    }

    pub fn findings_at_least(&self, min: Severity) -> impl Iterator<Item = &Finding> + '_ {
        self.findings.iter().filter(move |f| f.severity >= min)
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

/// Metadata supplied when sealing an aggregate
#[derive(Debug, Clone)]
pub struct SealInfo {
    pub status: ScanStatus,
    pub cancel_reason: Option<String>,
    pub skipped_checks: Vec<String>,
    pub requests_sent: u64,
}

impl SealInfo {
    pub fn completed(requests_sent: u64) -> Self {
        Self {
            status: ScanStatus::Completed,
            cancel_reason: None,
            skipped_checks: Vec::new(),
            requests_sent,
        }
    }

    pub fn cancelled(reason: impl Into<String>, skipped_checks: Vec<String>, requests_sent: u64) -> Self {
        Self {
            status: ScanStatus::Cancelled,
            cancel_reason: Some(reason.into()),
            skipped_checks,
            requests_sent,
        }
    }
}

#[derive(Debug, Default)]
struct AggregateState {
    findings: Vec<Finding>,
    seen: HashSet<FindingKey>,
    errors: Vec<CheckError>,
    checks_run: Vec<String>,
    in_flight: Vec<String>,
    sealed: bool,
}

/// Thread-safe, append-only collector for one running scan.
///
/// All mutation goes through a single mutex, so at most one writer touches
/// the finding sequence at a time. After [`ScanAggregate::seal`] every
/// further write is discarded.
#[derive(Debug)]
pub struct ScanAggregate {
    target: Target,
    started_at: DateTime<Utc>,
    state: Mutex<AggregateState>,
}

impl ScanAggregate {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            started_at: Utc::now(),
            state: Mutex::new(AggregateState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        // A panicking writer cannot leave the state half-updated in a way
        // that matters here, so keep going with the inner value.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Note that a check has been handed to a worker
    pub fn record_dispatch(&self, check_name: &str) {
        let mut state = self.lock();
        if state.sealed {
            return;
        }
        state.checks_run.push(check_name.to_string());
        state.in_flight.push(check_name.to_string());
    }

    /// Append findings, dropping any whose key was already recorded.
    ///
    /// Returns how many were kept.
    pub fn record_findings(&self, findings: Vec<Finding>) -> usize {
        let mut state = self.lock();
        if state.sealed {
            return 0;
        }
        let mut added = 0;
        for finding in findings {
            if state.seen.insert(finding.key()) {
                state.findings.push(finding);
                added += 1;
            }
        }
        added
    }

    pub fn record_error(&self, error: CheckError) -> bool {
        let mut state = self.lock();
        if state.sealed {
            return false;
        }
        state.errors.push(error);
        true
    }

    /// Note that a dispatched check has returned
    pub fn record_finished(&self, check_name: &str) {
        let mut state = self.lock();
        if let Some(pos) = state.in_flight.iter().position(|n| n == check_name) {
            state.in_flight.remove(pos);
        }
    }

    pub fn in_flight(&self) -> Vec<String> {
        self.lock().in_flight.clone()
    }

    pub fn finding_count(&self) -> usize {
        self.lock().findings.len()
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Freeze the aggregate into a [`ScanResult`].
    ///
    /// Checks still in flight are recorded as abandoned. Returns `None` if
    /// the aggregate was already sealed.
    pub fn seal(&self, info: SealInfo) -> Option<ScanResult> {
        let mut state = self.lock();
        if state.sealed {
            return None;
        }
        state.sealed = true;

        let abandoned = std::mem::take(&mut state.in_flight);
        for name in abandoned {
            state.errors.push(CheckError::new(
                name,
                "abandoned: did not return within the cancellation grace period",
            ));
        }

        let findings = std::mem::take(&mut state.findings);
        let severity_counts = SeverityCounts::from_findings(&findings);

        Some(ScanResult {
            target: self.target.clone(),
            status: info.status,
            cancel_reason: info.cancel_reason,
            started_at: self.started_at,
            finished_at: Utc::now(),
            findings,
            severity_counts,
            errors: std::mem::take(&mut state.errors),
            checks_run: std::mem::take(&mut state.checks_run),
            skipped_checks: info.skipped_checks,
            requests_sent: info.requests_sent,
        })
    }
}
