use dashmap::DashMap;
use optout_core_types::{IdentityData, ProfileId, TargetId};

use crate::{PersistenceError, ProfileState, ProfileStore};

/// Process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<ProfileId, ProfileState>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load(&self, profile: &ProfileId) -> ProfileState {
        self.profiles
            .get(profile)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| ProfileState::empty(profile.clone()))
    }

    fn merge(
        &self,
        profile: &ProfileId,
        identity: &IdentityData,
        newly_completed: &[TargetId],
    ) -> Result<ProfileState, PersistenceError> {
        let mut entry = self
            .profiles
            .entry(profile.clone())
            .or_insert_with(|| ProfileState::empty(profile.clone()));
        entry.absorb(identity, newly_completed);
        Ok(entry.value().clone())
    }

    fn list(&self) -> Result<Vec<ProfileId>, PersistenceError> {
        let mut profiles: Vec<_> = self.profiles.iter().map(|entry| entry.key().clone()).collect();
        profiles.sort();
        Ok(profiles)
    }

    fn remove(&self, profile: &ProfileId) -> Result<bool, PersistenceError> {
        Ok(self.profiles.remove(profile).is_some())
    }
}
