use std::collections::BTreeMap;
use std::fmt;

use optout_core_types::TargetId;
use optout_state_center::SkipReason;
use serde::Serialize;

/// Final state of one target in one run. Never changes once recorded.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed { reason: String },
    Skipped { reason: SkipReason },
}

impl RunOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        RunOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Failed { .. } => "failed",
            RunOutcome::Skipped { .. } => "skipped",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => f.write_str("completed"),
            RunOutcome::Failed { reason } => write!(f, "failed: {reason}"),
            RunOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TargetOutcome {
    pub target: TargetId,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub elapsed_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct OutcomeCounts {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Everything a run produced, in the order outcomes were recorded: skips
/// first, then targets as they finished.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<TargetOutcome>,
    pub requested_concurrency: usize,
    pub effective_concurrency: usize,
    /// Most targets observed running at the same time.
    pub peak_in_flight: usize,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn get(&self, target: &TargetId) -> Option<&RunOutcome> {
        self.outcomes
            .iter()
            .find(|entry| &entry.target == target)
            .map(|entry| &entry.outcome)
    }

    pub fn by_target(&self) -> BTreeMap<TargetId, RunOutcome> {
        self.outcomes
            .iter()
            .map(|entry| (entry.target.clone(), entry.outcome.clone()))
            .collect()
    }

    /// Targets that completed in this run, in completion order.
    pub fn completed_targets(&self) -> Vec<TargetId> {
        self.outcomes
            .iter()
            .filter(|entry| entry.outcome.is_completed())
            .map(|entry| entry.target.clone())
            .collect()
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for entry in &self.outcomes {
            match entry.outcome {
                RunOutcome::Completed => counts.completed += 1,
                RunOutcome::Failed { .. } => counts.failed += 1,
                RunOutcome::Skipped { .. } => counts.skipped += 1,
            }
        }
        counts
    }

    pub(crate) fn record(&mut self, target: TargetId, outcome: RunOutcome, elapsed_ms: u64) {
        self.outcomes.push(TargetOutcome {
            target,
            outcome,
            elapsed_ms,
        });
    }
}
