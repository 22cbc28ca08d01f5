//! Errors that stop a run before any browser session is opened

use std::path::PathBuf;

use optout_core_types::IdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Required identity fields are absent from both the CLI and the profile
    #[error("missing required identity fields: {}", .0.join(", "))]
    MissingIdentityFields(Vec<&'static str>),

    /// The workflow directory or a file in it cannot be read
    #[error("cannot read workflow source {}: {source}", path.display())]
    WorkflowIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A workflow file does not describe a valid workflow
    #[error("malformed workflow {}: {reason}", path.display())]
    WorkflowSource { path: PathBuf, reason: String },

    /// Two workflow files claim the same target id
    #[error("duplicate workflow id `{id}` in {} and {}", first.display(), second.display())]
    DuplicateWorkflow {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// `--only` named a target no workflow defines
    #[error("unknown target `{0}`")]
    UnknownTarget(String),

    /// The exclusion list exists but cannot be read
    #[error("cannot read exclusion list {}: {source}", path.display())]
    Exclusions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile name: {0}")]
    InvalidProfile(#[from] IdError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_listed() {
        let err = ConfigurationError::MissingIdentityFields(vec!["email", "zip"]);
        assert_eq!(err.to_string(), "missing required identity fields: email, zip");
    }
}
