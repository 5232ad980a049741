use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::model::set::Tick;

/// Severity attached to every recorded issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// Data-shaped conditions a stage reports without interrupting its worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageIssue {
    #[error("{stage}: input set out of order (previous start {previous}, observed {observed})")]
    OutOfOrderSets {
        stage: String,
        previous: Tick,
        observed: Tick,
    },
    #[error("{stage}: received set of unknown kind (algorithm {algorithm})")]
    UnknownSet { stage: String, algorithm: String },
    #[error("{stage}: algorithm {algorithm} failed; invocation discarded")]
    AlgorithmFatal { stage: String, algorithm: String },
    #[error("{stage}: send timed out; output from {algorithm} dropped")]
    FailedToSend { stage: String, algorithm: String },
}

/// Issue together with the severity it was reported at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    pub severity: Severity,
    pub issue: StageIssue,
}

/// Thread-safe issue sink shared between a stage and its worker.
///
/// Every record is also forwarded to the `log` facade so operators see the
/// condition without polling the snapshot.
#[derive(Clone, Default)]
pub struct IssueLog {
    entries: Arc<Mutex<Vec<IssueRecord>>>,
}

impl IssueLog {
    pub fn record(&self, severity: Severity, issue: StageIssue) {
        match severity {
            Severity::Warning => log::warn!("{issue}"),
            Severity::Error => log::error!("{issue}"),
            Severity::Fatal => log::error!("fatal: {issue}"),
        }
        let mut guard = self.entries.lock().unwrap();
        guard.push(IssueRecord { severity, issue });
    }

    pub fn snapshot(&self) -> Vec<IssueRecord> {
        self.entries.lock().unwrap().clone()
    }
}

/// Input/output counters owned by a stage and updated by its worker.
#[derive(Debug, Clone, Default)]
pub struct StageCounters {
    received: Arc<AtomicU64>,
    sent: Arc<AtomicU64>,
}

impl StageCounters {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
    }

    pub fn report(&self) -> StageReport {
        StageReport {
            received: self.received(),
            sent: self.sent(),
        }
    }
}

/// Counter snapshot exported when a worker exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageReport {
    pub received: u64,
    pub sent: u64,
}
