use std::collections::BTreeSet;
use std::sync::Arc;

use action_flow::{Action, AutoConfirmPrompter, Step, WorkflowDefinition};
use cdp_adapter::{DriverCommand, MemoryDriver};
use optout_core_types::{IdentityData, ProfileId, TargetId};
use optout_runner::{execute_plan, RunPlan};
use optout_scheduler::{RunOptions, RunOutcome, SkipReason};
use optout_state_center::{InMemoryProfileStore, ProfileStore};

fn jane() -> IdentityData {
    IdentityData::builder()
        .set("first_name", "Jane")
        .set("last_name", "Doe")
        .set("email", "j@x.com")
        .set("zip", "94110")
        .build()
}

fn workflow(id: &str) -> WorkflowDefinition {
    let steps: Vec<Step> = vec![
        Action::Navigate {
            url: format!("https://{id}.example/optout"),
        }
        .into(),
        Action::Fill {
            selector: "#email".into(),
            field: "email".into(),
        }
        .into(),
        Action::Click {
            selector: "#submit".into(),
        }
        .into(),
    ];
    WorkflowDefinition::new(id, steps)
}

fn plan(profile: &ProfileId) -> RunPlan {
    RunPlan {
        workflows: vec![workflow("a"), workflow("b")],
        identity: jane(),
        profile: Some(profile.clone()),
        save_profile: true,
        reset: false,
        excluded: BTreeSet::new(),
        options: RunOptions::default(),
    }
}

#[tokio::test]
async fn jane_doe_runs_both_targets_and_saves_them() {
    let driver = Arc::new(MemoryDriver::new());
    let store = InMemoryProfileStore::new();
    let profile = ProfileId::parse("jane").unwrap();

    let summary = execute_plan(
        plan(&profile),
        driver.clone(),
        Arc::new(AutoConfirmPrompter),
        &store,
    )
    .await;

    assert_eq!(
        summary.report.get(&TargetId::from("a")),
        Some(&RunOutcome::Completed)
    );
    assert_eq!(
        summary.report.get(&TargetId::from("b")),
        Some(&RunOutcome::Completed)
    );
    assert!(summary.save_error.is_none());

    let saved = store.load(&profile);
    let ids: Vec<_> = saved.completed_targets.iter().map(TargetId::as_str).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(saved.identity.get("email").map(String::as_str), Some("j@x.com"));

    let fills: Vec<_> = driver
        .commands()
        .into_iter()
        .filter(|record| matches!(record.command, DriverCommand::Fill { .. }))
        .collect();
    assert_eq!(fills.len(), 2);
    assert_eq!(driver.open_sessions(), 0);
}

#[tokio::test]
async fn rerun_skips_without_opening_sessions() {
    let store = InMemoryProfileStore::new();
    let profile = ProfileId::parse("jane").unwrap();
    execute_plan(
        plan(&profile),
        Arc::new(MemoryDriver::new()),
        Arc::new(AutoConfirmPrompter),
        &store,
    )
    .await;

    let driver = Arc::new(MemoryDriver::new());
    let summary = execute_plan(
        plan(&profile),
        driver.clone(),
        Arc::new(AutoConfirmPrompter),
        &store,
    )
    .await;

    for entry in &summary.report.outcomes {
        assert_eq!(
            entry.outcome,
            RunOutcome::Skipped {
                reason: SkipReason::AlreadyProcessed
            }
        );
    }
    assert_eq!(driver.sessions_opened(), 0);
}

#[tokio::test]
async fn failed_targets_are_not_saved() {
    let store = InMemoryProfileStore::new();
    let profile = ProfileId::parse("jane").unwrap();
    let driver = Arc::new(MemoryDriver::new().fail_navigation("b.example"));

    let summary = execute_plan(plan(&profile), driver, Arc::new(AutoConfirmPrompter), &store).await;

    assert!(summary.report.get(&TargetId::from("b")).unwrap().is_failed());
    let saved = summary.saved.expect("profile saved");
    assert!(saved.is_completed(&TargetId::from("a")));
    assert!(!saved.is_completed(&TargetId::from("b")));
}

#[tokio::test]
async fn without_save_flag_nothing_is_written() {
    let store = InMemoryProfileStore::new();
    let profile = ProfileId::parse("jane").unwrap();
    let mut plan = plan(&profile);
    plan.save_profile = false;

    let summary = execute_plan(
        plan,
        Arc::new(MemoryDriver::new()),
        Arc::new(AutoConfirmPrompter),
        &store,
    )
    .await;

    assert!(summary.saved.is_none());
    assert!(!store.load(&profile).exists());
}

#[tokio::test]
async fn jane_doe_in_parallel_with_a_waiting_target() {
    let driver = Arc::new(MemoryDriver::new());
    let store = InMemoryProfileStore::new();
    let profile = ProfileId::parse("jane").unwrap();

    let mut plan = plan(&profile);
    plan.workflows[1]
        .steps
        .push(Action::Wait { seconds: 0.2 }.into());
    plan.options = RunOptions::default().with_concurrency(2);

    let summary = execute_plan(plan, driver.clone(), Arc::new(AutoConfirmPrompter), &store).await;

    assert_eq!(summary.report.effective_concurrency, 2);
    assert_eq!(summary.report.counts().completed, 2);
    let order: Vec<_> = summary
        .report
        .outcomes
        .iter()
        .map(|entry| entry.target.as_str())
        .collect();
    assert_eq!(order, vec!["a", "b"]);

    let saved = store.load(&profile);
    let ids: Vec<_> = saved.completed_targets.iter().map(TargetId::as_str).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(driver.open_sessions(), 0);
}
