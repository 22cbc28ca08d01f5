use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use optout_core_types::{IdentityData, ProfileId, TargetId};
use serde::{Deserialize, Serialize};

/// Persisted progress of one profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileState {
    pub profile: ProfileId,
    #[serde(default)]
    pub identity: BTreeMap<String, String>,
    #[serde(default)]
    pub completed_targets: BTreeSet<TargetId>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProfileState {
    pub fn empty(profile: ProfileId) -> Self {
        Self {
            profile,
            identity: BTreeMap::new(),
            completed_targets: BTreeSet::new(),
            last_updated: None,
        }
    }

    /// Whether anything was ever saved for this profile.
    pub fn exists(&self) -> bool {
        self.last_updated.is_some()
    }

    pub fn is_completed(&self, target: &TargetId) -> bool {
        self.completed_targets.contains(target)
    }

    pub fn identity_data(&self) -> IdentityData {
        self.identity
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    /// Applies one run's result in place.
    pub(crate) fn absorb(&mut self, identity: &IdentityData, newly_completed: &[TargetId]) {
        self.identity = identity.clone().into_map();
        self.completed_targets
            .extend(newly_completed.iter().cloned());
        self.last_updated = Some(Utc::now());
    }
}
