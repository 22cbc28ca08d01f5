//! One complete run: skip decision, orchestration, profile merge

use std::collections::BTreeSet;
use std::sync::Arc;

use action_flow::{RecordPrompter, WorkflowDefinition};
use cdp_adapter::BrowserDriver;
use optout_core_types::{IdentityData, ProfileId, TargetId};
use optout_scheduler::{Orchestrator, RunOptions, RunReport, TargetRunner};
use optout_state_center::{ProfileState, ProfileStore, SkipPolicy};
use tracing::{info, warn};

/// Everything a run needs, already validated.
#[derive(Clone, Debug)]
pub struct RunPlan {
    pub workflows: Vec<WorkflowDefinition>,
    pub identity: IdentityData,
    /// Profile whose completed set seeds the skip decision.
    pub profile: Option<ProfileId>,
    /// Merge this run's completions into `profile` afterwards.
    pub save_profile: bool,
    /// Run previously completed targets again.
    pub reset: bool,
    pub excluded: BTreeSet<TargetId>,
    pub options: RunOptions,
}

#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    pub saved: Option<ProfileState>,
    /// Set when the profile merge failed; the run itself still counts.
    pub save_error: Option<String>,
}

pub async fn execute_plan(
    plan: RunPlan,
    driver: Arc<dyn BrowserDriver>,
    prompter: Arc<dyn RecordPrompter>,
    store: &dyn ProfileStore,
) -> RunSummary {
    let completed = plan
        .profile
        .as_ref()
        .map(|profile| store.load(profile).completed_targets)
        .unwrap_or_default();
    let skip = SkipPolicy::new(plan.excluded, completed).with_reset(plan.reset);

    let identity = Arc::new(plan.identity);
    let orchestrator = Orchestrator::new(TargetRunner::new(driver, prompter));
    let report = orchestrator
        .run_all(plan.workflows, Arc::clone(&identity), &skip, &plan.options)
        .await;

    let mut summary = RunSummary {
        report,
        saved: None,
        save_error: None,
    };
    let Some(profile) = plan.profile.filter(|_| plan.save_profile) else {
        return summary;
    };

    let newly_completed = summary.report.completed_targets();
    match store.merge(&profile, &identity, &newly_completed) {
        Ok(state) => {
            info!(
                profile = %profile,
                completed = state.completed_targets.len(),
                "progress saved"
            );
            summary.saved = Some(state);
        }
        Err(err) => {
            warn!(profile = %profile, error = %err, "failed to save progress");
            summary.save_error = Some(err.to_string());
        }
    }
    summary
}
