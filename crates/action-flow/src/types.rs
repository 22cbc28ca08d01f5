//! Core types for workflow steps

use optout_core_types::TargetId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which form of the identity's state `select_state` picks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateFormat {
    /// The `state` field as supplied, e.g. "California".
    #[default]
    Literal,
    /// The derived two-letter code, e.g. "CA".
    Abbreviation,
}

/// A recognised action, keyed by the `action` name in the workflow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Load `url` in the session.
    Navigate { url: String },

    /// Type the identity value named by `field` into `selector`.
    Fill { selector: String, field: String },

    /// Click the element matched by `selector`.
    Click { selector: String },

    /// Suspend this workflow for `seconds` (fractional allowed).
    Wait { seconds: f64 },

    /// Pause until a human confirms they picked the right record.
    PromptUserToSelectRecord {
        #[serde(default)]
        description: String,
    },

    /// Choose an option of a `<select>`. The first present of value, label,
    /// index and field decides how the option is matched.
    Select {
        selector: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        index: Option<u32>,
        #[serde(default)]
        field: Option<String>,
    },

    /// Choose the identity's state in a `<select>`.
    SelectState {
        selector: String,
        #[serde(default)]
        format: StateFormat,
    },
}

impl Action {
    /// Every action name the interpreter dispatches.
    pub const KNOWN: [&'static str; 7] = [
        "navigate",
        "fill",
        "click",
        "wait",
        "prompt_user_to_select_record",
        "select",
        "select_state",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Fill { .. } => "fill",
            Action::Click { .. } => "click",
            Action::Wait { .. } => "wait",
            Action::PromptUserToSelectRecord { .. } => "prompt_user_to_select_record",
            Action::Select { .. } => "select",
            Action::SelectState { .. } => "select_state",
        }
    }
}

/// One entry of a workflow's `steps` list.
///
/// Known action names must carry the parameters their action needs; any
/// other name becomes [`Step::Unknown`] and is skipped at execution time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Step {
    Action(Action),
    Unknown { action: String },
}

impl Step {
    pub fn kind(&self) -> &str {
        match self {
            Step::Action(action) => action.kind(),
            Step::Unknown { action } => action,
        }
    }
}

impl From<Action> for Step {
    fn from(action: Action) -> Self {
        Step::Action(action)
    }
}

impl TryFrom<Value> for Step {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let name = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| "step has no `action` name".to_string())?
            .to_string();

        if !Action::KNOWN.contains(&name.as_str()) {
            return Ok(Step::Unknown { action: name });
        }

        serde_json::from_value(value)
            .map(Step::Action)
            .map_err(|err| format!("invalid `{name}` step: {err}"))
    }
}

/// One target site's workflow. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDefinition {
    pub id: TargetId,
    pub name: String,
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
        let id = TargetId::new(id);
        Self {
            name: id.to_string(),
            id,
            steps,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<Vec<Step>, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    #[test]
    fn parses_every_known_action() {
        let steps = parse(
            r##"
- action: navigate
  url: https://acme.example/optout
- action: fill
  selector: "#email"
  field: email
- action: click
  selector: "button"
- action: wait
  seconds: 2
- action: prompt_user_to_select_record
  description: Pick your listing
- action: select
  selector: "#reason"
  label: Other
- action: select_state
  selector: "#state"
  format: abbreviation
"##,
        )
        .unwrap();

        let kinds: Vec<_> = steps.iter().map(Step::kind).collect();
        assert_eq!(kinds, Action::KNOWN.to_vec());
        assert_eq!(steps[3], Step::Action(Action::Wait { seconds: 2.0 }));
        assert_eq!(
            steps[6],
            Step::Action(Action::SelectState {
                selector: "#state".into(),
                format: StateFormat::Abbreviation,
            })
        );
    }

    #[test]
    fn unknown_action_is_kept_as_unknown() {
        let steps = parse("- action: hover\n  selector: '#x'\n").unwrap();
        assert_eq!(
            steps,
            vec![Step::Unknown {
                action: "hover".into()
            }]
        );
    }

    #[test]
    fn known_action_missing_parameter_is_rejected() {
        let err = parse("- action: fill\n  selector: '#x'\n").unwrap_err();
        assert!(err.to_string().contains("invalid `fill` step"));
    }

    #[test]
    fn step_without_action_name_is_rejected() {
        assert!(parse("- url: https://acme.example\n").is_err());
    }

    #[test]
    fn select_state_defaults_to_literal() {
        let steps = parse("- action: select_state\n  selector: '#s'\n").unwrap();
        assert_eq!(
            steps[0],
            Step::Action(Action::SelectState {
                selector: "#s".into(),
                format: StateFormat::Literal,
            })
        );
    }

    #[test]
    fn workflow_name_defaults_to_id() {
        let workflow = WorkflowDefinition::new("acme", Vec::new());
        assert_eq!(workflow.name, "acme");
        assert_eq!(workflow.with_name("Acme").name, "Acme");
    }
}
