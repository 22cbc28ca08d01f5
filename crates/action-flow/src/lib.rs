//! Workflow step model and interpreter
//!
//! A workflow is an ordered list of [`Step`]s executed against one
//! [`cdp_adapter::BrowserSession`] and one [`optout_core_types::IdentityData`]
//! bundle. Execution stops at the first failing step; unknown actions are
//! logged and skipped.

pub mod errors;
pub mod executor;
pub mod prompt;
pub mod types;

pub use errors::{StepError, StepExecutionError};
pub use executor::execute;
pub use prompt::{
    AutoConfirmPrompter, ChannelPrompter, PromptRequest, RecordPrompter, TerminalPrompter,
};
pub use types::{Action, StateFormat, Step, WorkflowDefinition};
