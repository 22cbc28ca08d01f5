//! Step execution error types

use cdp_adapter::AdapterError;
use thiserror::Error;

/// Why a single step could not complete.
#[derive(Debug, Error)]
pub enum StepError {
    /// The step references an identity field the bundle does not carry
    #[error("identity field `{0}` is not set")]
    UnresolvedField(String),

    /// The step's parameters cannot be executed as written
    #[error("invalid step: {0}")]
    InvalidStep(String),

    /// `select_state` found neither a state nor an abbreviation
    #[error("identity has neither `state` nor `state_abbreviation`")]
    MissingState,

    /// The browser driver rejected the call
    #[error("driver error: {0}")]
    Driver(#[from] AdapterError),

    /// The human confirmation channel failed
    #[error("record prompt failed: {0}")]
    Prompt(String),
}

/// First failing step of a workflow.
#[derive(Debug, Error)]
#[error("step {step_index} ({action_kind}) failed: {cause}")]
pub struct StepExecutionError {
    pub step_index: usize,
    pub action_kind: String,
    #[source]
    pub cause: StepError,
}

impl StepExecutionError {
    pub fn new(step_index: usize, action_kind: impl Into<String>, cause: StepError) -> Self {
        Self {
            step_index,
            action_kind: action_kind.into(),
            cause,
        }
    }
}
