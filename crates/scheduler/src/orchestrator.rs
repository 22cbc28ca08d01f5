use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_flow::WorkflowDefinition;
use optout_core_types::{IdentityData, TargetId};
use optout_state_center::SkipPolicy;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};

use crate::metrics;
use crate::model::{RunOutcome, RunReport};
use crate::runner::TargetRunner;

pub const DEADLINE_REASON: &str = "run deadline exceeded before target started";

#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Requested worker count; clamped to `[1, runnable targets]`.
    pub concurrency: usize,
    /// No target starts once this much time has passed since the run began.
    pub deadline: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            deadline: None,
        }
    }
}

impl RunOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Dispatches every selected workflow through a [`TargetRunner`].
///
/// One target's failure never affects another; the report always holds one
/// outcome per input workflow.
pub struct Orchestrator {
    runner: TargetRunner,
}

impl Orchestrator {
    pub fn new(runner: TargetRunner) -> Self {
        Self { runner }
    }

    pub async fn run_all(
        &self,
        workflows: Vec<WorkflowDefinition>,
        identity: Arc<IdentityData>,
        skip: &SkipPolicy,
        options: &RunOptions,
    ) -> RunReport {
        let started = Instant::now();
        let deadline = options.deadline.map(|limit| started + limit);
        let mut report = RunReport {
            requested_concurrency: options.concurrency,
            ..RunReport::default()
        };

        let mut runnable = Vec::with_capacity(workflows.len());
        for workflow in workflows {
            match skip.decide(&workflow.id) {
                Some(reason) => {
                    info!(target_id = %workflow.id, %reason, "skipping target");
                    metrics::record_skipped();
                    report.record(workflow.id, RunOutcome::Skipped { reason }, 0);
                }
                None => runnable.push(workflow),
            }
        }

        let effective = clamp_concurrency(options.concurrency, runnable.len());
        if effective != options.concurrency {
            info!(
                requested = options.concurrency,
                effective,
                runnable = runnable.len(),
                "concurrency clamped"
            );
        }
        report.effective_concurrency = effective;
        info!(
            targets = runnable.len(),
            skipped = report.outcomes.len(),
            concurrency = effective,
            "run starting"
        );

        let peak = Arc::new(PeakCounter::default());
        if effective == 1 {
            self.run_sequential(runnable, &identity, deadline, &peak, &mut report)
                .await;
        } else {
            self.run_parallel(runnable, identity, effective, deadline, &peak, &mut report)
                .await;
        }

        report.peak_in_flight = peak.peak();
        report.elapsed_ms = elapsed_ms(started);
        let counts = report.counts();
        info!(
            completed = counts.completed,
            failed = counts.failed,
            skipped = counts.skipped,
            elapsed_ms = report.elapsed_ms,
            "run finished"
        );
        report
    }

    async fn run_sequential(
        &self,
        runnable: Vec<WorkflowDefinition>,
        identity: &IdentityData,
        deadline: Option<Instant>,
        peak: &PeakCounter,
        report: &mut RunReport,
    ) {
        for workflow in runnable {
            let (target, outcome, elapsed) =
                run_target(&self.runner, &workflow, identity, deadline, peak).await;
            report.record(target, outcome, elapsed);
        }
    }

    async fn run_parallel(
        &self,
        runnable: Vec<WorkflowDefinition>,
        identity: Arc<IdentityData>,
        workers: usize,
        deadline: Option<Instant>,
        peak: &Arc<PeakCounter>,
        report: &mut RunReport,
    ) {
        let slots = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();
        let mut tasks: HashMap<tokio::task::Id, TargetId> = HashMap::new();

        for workflow in runnable {
            let target = workflow.id.clone();
            let runner = self.runner.clone();
            let identity = Arc::clone(&identity);
            let slots = Arc::clone(&slots);
            let peak = Arc::clone(peak);
            let handle = join_set.spawn(async move {
                let _permit = match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        return (
                            workflow.id,
                            RunOutcome::failed(format!("worker pool closed: {err}")),
                            0,
                        )
                    }
                };
                run_target(&runner, &workflow, &identity, deadline, &peak).await
            });
            tasks.insert(handle.id(), target);
        }

        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, (target, outcome, elapsed))) => {
                    tasks.remove(&id);
                    report.record(target, outcome, elapsed);
                }
                Err(err) => {
                    let Some(target) = tasks.remove(&err.id()) else {
                        warn!(error = %err, "worker finished without a known target");
                        continue;
                    };
                    warn!(target_id = %target, error = %err, "worker task aborted");
                    metrics::record_failed();
                    let outcome = RunOutcome::failed(format!("worker task failed: {err}"));
                    report.record(target, outcome, 0);
                }
            }
        }
    }
}

async fn run_target(
    runner: &TargetRunner,
    workflow: &WorkflowDefinition,
    identity: &IdentityData,
    deadline: Option<Instant>,
    peak: &PeakCounter,
) -> (TargetId, RunOutcome, u64) {
    if deadline.is_some_and(|at| Instant::now() >= at) {
        warn!(target_id = %workflow.id, "deadline passed; target not started");
        metrics::record_failed();
        return (workflow.id.clone(), RunOutcome::failed(DEADLINE_REASON), 0);
    }

    let started = Instant::now();
    let _in_flight = metrics::track_in_flight();
    let _slot = peak.enter();
    let span = info_span!("target", target_id = %workflow.id, name = %workflow.name);
    let outcome = runner.run(workflow, identity).instrument(span).await;

    match &outcome {
        RunOutcome::Completed => {
            metrics::record_completed();
            info!(target_id = %workflow.id, "target completed");
        }
        RunOutcome::Failed { reason } => {
            metrics::record_failed();
            warn!(target_id = %workflow.id, %reason, "target failed");
        }
        RunOutcome::Skipped { .. } => {}
    }
    (workflow.id.clone(), outcome, elapsed_ms(started))
}

/// `requested` bounded to `[1, runnable]`; 1 when nothing is runnable.
pub fn clamp_concurrency(requested: usize, runnable: usize) -> usize {
    requested.clamp(1, runnable.max(1))
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Per-run count of targets currently running.
#[derive(Default)]
struct PeakCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl PeakCounter {
    fn enter(&self) -> PeakSlot<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        PeakSlot { counter: self }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct PeakSlot<'a> {
    counter: &'a PeakCounter,
}

impl Drop for PeakSlot<'_> {
    fn drop(&mut self) {
        self.counter.current.fetch_sub(1, Ordering::SeqCst);
    }
}
