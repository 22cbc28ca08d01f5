//! Resumable progress per identity profile.
//!
//! A profile records the identity fields used for a run and the set of
//! targets already completed for it, so the next run can skip them. Writes
//! always re-read and union, never replace.

use std::collections::BTreeSet;
use std::fmt;

use optout_core_types::{IdentityData, ProfileId, TargetId};
use serde::Serialize;
use thiserror::Error;

mod json;
mod memory;
mod state;

pub use json::JsonProfileStore;
pub use memory::InMemoryProfileStore;
pub use state::ProfileState;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("profile store i/o failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("profile {profile} could not be encoded: {source}")]
    Encode {
        profile: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("profile file {path} is not valid: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage for [`ProfileState`]s keyed by profile name.
pub trait ProfileStore: Send + Sync {
    /// Stored state, or an empty state when there is none or it cannot be
    /// read. Never fails.
    fn load(&self, profile: &ProfileId) -> ProfileState;

    /// Unions `newly_completed` into the stored set, replaces the identity
    /// fields and bumps `last_updated`. Re-reads before writing.
    fn merge(
        &self,
        profile: &ProfileId,
        identity: &IdentityData,
        newly_completed: &[TargetId],
    ) -> Result<ProfileState, PersistenceError>;

    fn list(&self) -> Result<Vec<ProfileId>, PersistenceError>;

    /// Returns whether a stored profile existed.
    fn remove(&self, profile: &ProfileId) -> Result<bool, PersistenceError>;
}

/// Why a target is not dispatched in this run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyProcessed,
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => f.write_str("already processed"),
            SkipReason::Excluded => f.write_str("excluded"),
        }
    }
}

/// Decides, before dispatch, which targets a run leaves alone.
///
/// Exclusion always wins. Previously completed targets are skipped unless
/// the run is a reset.
#[derive(Clone, Debug, Default)]
pub struct SkipPolicy {
    excluded: BTreeSet<TargetId>,
    completed: BTreeSet<TargetId>,
    reset: bool,
}

impl SkipPolicy {
    pub fn new(excluded: BTreeSet<TargetId>, completed: BTreeSet<TargetId>) -> Self {
        Self {
            excluded,
            completed,
            reset: false,
        }
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    pub fn decide(&self, target: &TargetId) -> Option<SkipReason> {
        if self.excluded.contains(target) {
            return Some(SkipReason::Excluded);
        }
        if !self.reset && self.completed.contains(target) {
            return Some(SkipReason::AlreadyProcessed);
        }
        None
    }
}
