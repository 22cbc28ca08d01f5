use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use action_flow::{execute, RecordPrompter, WorkflowDefinition};
use cdp_adapter::BrowserDriver;
use futures::FutureExt;
use optout_core_types::IdentityData;
use tracing::{debug, warn};

use crate::model::RunOutcome;

/// Runs one workflow in a fresh browser session.
///
/// The session is closed on every path, including a panicking step. Errors
/// never escape; they become [`RunOutcome::Failed`].
#[derive(Clone)]
pub struct TargetRunner {
    driver: Arc<dyn BrowserDriver>,
    prompter: Arc<dyn RecordPrompter>,
}

impl TargetRunner {
    pub fn new(driver: Arc<dyn BrowserDriver>, prompter: Arc<dyn RecordPrompter>) -> Self {
        Self { driver, prompter }
    }

    pub async fn run(&self, workflow: &WorkflowDefinition, identity: &IdentityData) -> RunOutcome {
        let mut session = match self.driver.new_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(target_id = %workflow.id, error = %err, "could not open browser session");
                return RunOutcome::failed(format!("could not open browser session: {err}"));
            }
        };
        debug!(
            target_id = %workflow.id,
            session = %session.id(),
            steps = workflow.steps.len(),
            "session opened"
        );

        let executed = AssertUnwindSafe(execute(
            session.as_mut(),
            &workflow.steps,
            identity,
            self.prompter.as_ref(),
        ))
        .catch_unwind()
        .await;

        if let Err(err) = session.close().await {
            warn!(target_id = %workflow.id, error = %err, "failed to close browser session");
        }

        match executed {
            Ok(Ok(())) => RunOutcome::Completed,
            Ok(Err(err)) => RunOutcome::failed(err.to_string()),
            Err(panic) => {
                RunOutcome::failed(format!("workflow panicked: {}", panic_message(&*panic)))
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
