//! Step interpreter

use std::time::Duration;

use cdp_adapter::{BrowserSession, SelectTarget};
use optout_core_types::{fields, IdentityData};
use tracing::{debug, warn};

use crate::errors::{StepError, StepExecutionError};
use crate::prompt::RecordPrompter;
use crate::types::{Action, StateFormat, Step};

/// Runs `steps` in order against `session`.
///
/// Stops at the first failing step and reports its index and kind. Unknown
/// actions are logged and skipped. The session is left open; closing it is
/// the caller's job.
pub async fn execute(
    session: &mut dyn BrowserSession,
    steps: &[Step],
    identity: &IdentityData,
    prompter: &dyn RecordPrompter,
) -> Result<(), StepExecutionError> {
    for (index, step) in steps.iter().enumerate() {
        let action = match step {
            Step::Action(action) => action,
            Step::Unknown { action } => {
                warn!(step = index, action = %action, "Unknown action; skipping step");
                continue;
            }
        };

        debug!(step = index, action = action.kind(), "executing step");
        execute_action(session, action, identity, prompter)
            .await
            .map_err(|cause| StepExecutionError::new(index, action.kind(), cause))?;
    }
    Ok(())
}

async fn execute_action(
    session: &mut dyn BrowserSession,
    action: &Action,
    identity: &IdentityData,
    prompter: &dyn RecordPrompter,
) -> Result<(), StepError> {
    match action {
        Action::Navigate { url } => session.navigate(url).await?,
        Action::Fill { selector, field } => {
            let value = resolve_field(identity, field)?;
            session.fill(selector, value).await?
        }
        Action::Click { selector } => session.click(selector).await?,
        Action::Wait { seconds } => {
            let pause = Duration::try_from_secs_f64(*seconds).map_err(|_| {
                StepError::InvalidStep(format!("cannot wait for {seconds} seconds"))
            })?;
            tokio::time::sleep(pause).await;
        }
        Action::PromptUserToSelectRecord { description } => {
            prompter.confirm_record(description).await?
        }
        Action::Select {
            selector,
            value,
            label,
            index,
            field,
        } => {
            let target = select_target(
                identity,
                value.as_deref(),
                label.as_deref(),
                *index,
                field.as_deref(),
            )?;
            session.select_option(selector, &target).await?
        }
        Action::SelectState { selector, format } => {
            let state = state_value(identity, *format)?;
            session
                .select_option(selector, &SelectTarget::Value(state.to_string()))
                .await?
        }
    }
    Ok(())
}

fn resolve_field<'a>(identity: &'a IdentityData, field: &str) -> Result<&'a str, StepError> {
    identity
        .get(field)
        .ok_or_else(|| StepError::UnresolvedField(field.to_string()))
}

/// value, then label, then index, then a field reference matched by value.
fn select_target(
    identity: &IdentityData,
    value: Option<&str>,
    label: Option<&str>,
    index: Option<u32>,
    field: Option<&str>,
) -> Result<SelectTarget, StepError> {
    if let Some(value) = value {
        return Ok(SelectTarget::Value(value.to_string()));
    }
    if let Some(label) = label {
        return Ok(SelectTarget::Label(label.to_string()));
    }
    if let Some(index) = index {
        return Ok(SelectTarget::Index(index));
    }
    if let Some(field) = field {
        let resolved = resolve_field(identity, field)?;
        return Ok(SelectTarget::Value(resolved.to_string()));
    }
    Err(StepError::InvalidStep(
        "select needs one of value, label, index or field".into(),
    ))
}

fn state_value(identity: &IdentityData, format: StateFormat) -> Result<&str, StepError> {
    let literal = identity.get(fields::STATE);
    let abbreviation = identity.get(fields::STATE_ABBREVIATION);
    let chosen = match format {
        StateFormat::Abbreviation => abbreviation.or(literal),
        StateFormat::Literal => literal.or(abbreviation),
    };
    chosen.ok_or(StepError::MissingState)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{AutoConfirmPrompter, ChannelPrompter};
    use cdp_adapter::{AdapterErrorKind, BrowserDriver, DriverCommand, MemoryDriver};

    fn jane() -> IdentityData {
        IdentityData::builder()
            .set("first_name", "Jane")
            .set("last_name", "Doe")
            .set("email", "j@x.com")
            .set("zip", "94110")
            .build()
    }

    fn select(
        value: Option<&str>,
        label: Option<&str>,
        index: Option<u32>,
        field: Option<&str>,
    ) -> Step {
        Step::Action(Action::Select {
            selector: "#s".into(),
            value: value.map(Into::into),
            label: label.map(Into::into),
            index,
            field: field.map(Into::into),
        })
    }

    async fn run(
        steps: &[Step],
        identity: &IdentityData,
    ) -> (Result<(), StepExecutionError>, Vec<DriverCommand>) {
        let driver = MemoryDriver::new();
        let mut session = driver.new_session().await.unwrap();
        let result = execute(session.as_mut(), steps, identity, &AutoConfirmPrompter).await;
        let commands = driver
            .commands_for(session.id())
            .into_iter()
            .filter(|command| *command != DriverCommand::Open)
            .collect();
        (result, commands)
    }

    fn selected(selector: &str, target: SelectTarget) -> DriverCommand {
        DriverCommand::Select {
            selector: selector.into(),
            target,
        }
    }

    #[tokio::test]
    async fn fills_identity_fields_in_order() {
        let steps: Vec<Step> = vec![
            Action::Navigate {
                url: "https://acme.example/optout".into(),
            }
            .into(),
            Action::Fill {
                selector: "#first".into(),
                field: "first_name".into(),
            }
            .into(),
            Action::Click {
                selector: "#go".into(),
            }
            .into(),
        ];
        let (result, commands) = run(&steps, &jane()).await;
        result.unwrap();
        assert_eq!(
            commands,
            vec![
                DriverCommand::Navigate {
                    url: "https://acme.example/optout".into()
                },
                DriverCommand::Fill {
                    selector: "#first".into(),
                    value: "Jane".into()
                },
                DriverCommand::Click {
                    selector: "#go".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn select_prefers_value_over_label() {
        let steps = vec![select(Some("X"), Some("Y"), None, None)];
        let (result, commands) = run(&steps, &jane()).await;
        result.unwrap();
        assert_eq!(commands, vec![selected("#s", SelectTarget::Value("X".into()))]);
    }

    #[tokio::test]
    async fn select_falls_through_label_index_field() {
        let steps = vec![
            select(None, Some("Other"), Some(3), None),
            select(None, None, Some(3), Some("zip")),
            select(None, None, None, Some("zip")),
        ];
        let (result, commands) = run(&steps, &jane()).await;
        result.unwrap();
        assert_eq!(
            commands,
            vec![
                selected("#s", SelectTarget::Label("Other".into())),
                selected("#s", SelectTarget::Index(3)),
                selected("#s", SelectTarget::Value("94110".into())),
            ]
        );
    }

    #[tokio::test]
    async fn select_without_any_target_is_invalid() {
        let steps = vec![select(None, None, None, None)];
        let (result, commands) = run(&steps, &jane()).await;
        let err = result.unwrap_err();
        assert_eq!(err.step_index, 0);
        assert!(matches!(err.cause, StepError::InvalidStep(_)));
        assert!(commands.is_empty());
    }

    #[tokio::test]
    async fn select_state_abbreviation_falls_back_to_literal() {
        let identity = IdentityData::builder()
            .set("state", "Ontario")
            .build();
        assert!(identity.get("state_abbreviation").is_none());

        let steps = vec![Step::Action(Action::SelectState {
            selector: "#state".into(),
            format: StateFormat::Abbreviation,
        })];
        let (result, commands) = run(&steps, &identity).await;
        result.unwrap();
        assert_eq!(
            commands,
            vec![selected("#state", SelectTarget::Value("Ontario".into()))]
        );
    }

    #[tokio::test]
    async fn select_state_uses_derived_abbreviation() {
        let identity = IdentityData::builder().set("state", "California").build();
        let steps = vec![
            Step::Action(Action::SelectState {
                selector: "#abbr".into(),
                format: StateFormat::Abbreviation,
            }),
            Step::Action(Action::SelectState {
                selector: "#full".into(),
                format: StateFormat::Literal,
            }),
        ];
        let (result, commands) = run(&steps, &identity).await;
        result.unwrap();
        assert_eq!(
            commands,
            vec![
                selected("#abbr", SelectTarget::Value("CA".into())),
                selected("#full", SelectTarget::Value("California".into())),
            ]
        );
    }

    #[tokio::test]
    async fn select_state_literal_falls_back_to_abbreviation() {
        let identity = IdentityData::builder()
            .set("state_abbreviation", "TX")
            .build();
        let steps = vec![Step::Action(Action::SelectState {
            selector: "#state".into(),
            format: StateFormat::Literal,
        })];
        let (result, commands) = run(&steps, &identity).await;
        result.unwrap();
        assert_eq!(commands, vec![selected("#state", SelectTarget::Value("TX".into()))]);
    }

    #[tokio::test]
    async fn select_state_without_state_fails() {
        let steps = vec![Step::Action(Action::SelectState {
            selector: "#state".into(),
            format: StateFormat::Literal,
        })];
        let (result, _) = run(&steps, &jane()).await;
        let err = result.unwrap_err();
        assert_eq!(err.action_kind, "select_state");
        assert!(matches!(err.cause, StepError::MissingState));
    }

    #[tokio::test]
    async fn unresolved_field_stops_the_workflow() {
        let steps: Vec<Step> = vec![
            Action::Fill {
                selector: "#phone".into(),
                field: "phone".into(),
            }
            .into(),
            Action::Click {
                selector: "#go".into(),
            }
            .into(),
        ];
        let (result, commands) = run(&steps, &jane()).await;
        let err = result.unwrap_err();
        assert_eq!(err.step_index, 0);
        assert_eq!(err.action_kind, "fill");
        assert!(matches!(err.cause, StepError::UnresolvedField(ref f) if f == "phone"));
        assert!(commands.is_empty());
    }

    #[tokio::test]
    async fn unknown_action_is_skipped() {
        let steps = vec![
            Step::Unknown {
                action: "hover".into(),
            },
            Action::Click {
                selector: "#go".into(),
            }
            .into(),
        ];
        let (result, commands) = run(&steps, &jane()).await;
        result.unwrap();
        assert_eq!(
            commands,
            vec![DriverCommand::Click {
                selector: "#go".into()
            }]
        );
    }

    #[tokio::test]
    async fn driver_failure_reports_step_index() {
        let driver = MemoryDriver::new().fail_selector("#missing");
        let mut session = driver.new_session().await.unwrap();
        let steps: Vec<Step> = vec![
            Action::Click {
                selector: "#ok".into(),
            }
            .into(),
            Action::Click {
                selector: "#missing".into(),
            }
            .into(),
            Action::Click {
                selector: "#never".into(),
            }
            .into(),
        ];
        let err = execute(session.as_mut(), &steps, &jane(), &AutoConfirmPrompter)
            .await
            .unwrap_err();
        assert_eq!(err.step_index, 1);
        match err.cause {
            StepError::Driver(adapter) => assert_eq!(adapter.kind, AdapterErrorKind::TargetNotFound),
            other => panic!("unexpected cause {other:?}"),
        }
        let clicks = driver
            .commands_for(session.id())
            .into_iter()
            .filter(|command| matches!(command, DriverCommand::Click { .. }))
            .count();
        assert_eq!(clicks, 2);
    }

    #[tokio::test]
    async fn wait_rejects_negative_seconds() {
        let steps = vec![Step::Action(Action::Wait { seconds: -1.0 })];
        let (result, _) = run(&steps, &jane()).await;
        assert!(matches!(result.unwrap_err().cause, StepError::InvalidStep(_)));
    }

    #[tokio::test]
    async fn wait_accepts_fractional_seconds() {
        let steps = vec![Step::Action(Action::Wait { seconds: 0.01 })];
        let (result, _) = run(&steps, &jane()).await;
        result.unwrap();
    }

    #[tokio::test]
    async fn prompt_suspends_until_confirmed() {
        let driver = MemoryDriver::new();
        let (prompter, mut requests) = ChannelPrompter::new();
        let identity = jane();

        let task = tokio::spawn(async move {
            let mut session = driver.new_session().await.unwrap();
            let steps: Vec<Step> = vec![
                Action::PromptUserToSelectRecord {
                    description: "Pick Jane Doe, San Francisco".into(),
                }
                .into(),
                Action::Click {
                    selector: "#remove".into(),
                }
                .into(),
            ];
            let result = execute(session.as_mut(), &steps, &identity, &prompter).await;
            (result, driver.commands_for(session.id()))
        });

        let request = requests.recv().await.unwrap();
        assert_eq!(request.description, "Pick Jane Doe, San Francisco");
        request.confirm();

        let (result, commands) = task.await.unwrap();
        result.unwrap();
        assert_eq!(
            commands.last(),
            Some(&DriverCommand::Click {
                selector: "#remove".into()
            })
        );
    }
}
