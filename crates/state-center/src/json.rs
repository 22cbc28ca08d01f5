use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use optout_core_types::{IdentityData, ProfileId, TargetId};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{PersistenceError, ProfileState, ProfileStore};

/// On-disk shape. The profile name comes from the file name, so a record
/// without a `profile` key (or with a different one) still loads.
#[derive(Deserialize)]
struct StoredRecord {
    #[serde(default)]
    identity: BTreeMap<String, String>,
    #[serde(default)]
    completed_targets: BTreeSet<TargetId>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

impl StoredRecord {
    fn into_state(self, profile: &ProfileId) -> ProfileState {
        ProfileState {
            profile: profile.clone(),
            identity: self.identity,
            completed_targets: self.completed_targets,
            last_updated: self.last_updated,
        }
    }
}

/// One pretty-printed JSON file per profile: `<dir>/<profile>.json`.
///
/// Writes go to a temp file in the same directory which is then renamed over
/// the profile file, so readers never see a partial document.
#[derive(Clone, Debug)]
pub struct JsonProfileStore {
    dir: PathBuf,
}

impl JsonProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, profile: &ProfileId) -> PathBuf {
        self.dir.join(format!("{profile}.json"))
    }

    fn read(&self, profile: &ProfileId) -> Result<Option<ProfileState>, PersistenceError> {
        let path = self.path_for(profile);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };
        let record: StoredRecord =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Some(record.into_state(profile)))
    }

    /// Moves an unparseable profile file aside so its contents survive the
    /// next write.
    fn quarantine(&self, profile: &ProfileId) -> Result<PathBuf, PersistenceError> {
        let path = self.path_for(profile);
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let aside = self.dir.join(format!("{profile}.json.corrupt-{stamp}"));
        fs::rename(&path, &aside).map_err(|source| io_error(&path, source))?;
        Ok(aside)
    }

    fn write(&self, state: &ProfileState) -> Result<(), PersistenceError> {
        let path = self.path_for(&state.profile);
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        let json =
            serde_json::to_vec_pretty(state).map_err(|source| PersistenceError::Encode {
                profile: state.profile.to_string(),
                source,
            })?;

        let mut file = NamedTempFile::new_in(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        file.write_all(&json)
            .and_then(|_| file.as_file().sync_all())
            .map_err(|source| io_error(file.path(), source))?;
        file.persist(&path)
            .map_err(|err| io_error(&path, err.error))?;
        Ok(())
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self, profile: &ProfileId) -> ProfileState {
        match self.read(profile) {
            Ok(Some(state)) => {
                debug!(
                    profile = %profile,
                    completed = state.completed_targets.len(),
                    "profile loaded"
                );
                state
            }
            Ok(None) => ProfileState::empty(profile.clone()),
            Err(err) => {
                warn!(profile = %profile, error = %err, "profile unreadable; starting empty");
                ProfileState::empty(profile.clone())
            }
        }
    }

    fn merge(
        &self,
        profile: &ProfileId,
        identity: &IdentityData,
        newly_completed: &[TargetId],
    ) -> Result<ProfileState, PersistenceError> {
        let mut state = match self.read(profile) {
            Ok(Some(state)) => state,
            Ok(None) => ProfileState::empty(profile.clone()),
            Err(err @ PersistenceError::Corrupt { .. }) => {
                let aside = self.quarantine(profile)?;
                warn!(
                    profile = %profile,
                    error = %err,
                    moved_to = %aside.display(),
                    "unreadable profile moved aside"
                );
                ProfileState::empty(profile.clone())
            }
            Err(err) => return Err(err),
        };
        state.absorb(identity, newly_completed);
        self.write(&state)?;
        info!(
            profile = %profile,
            added = newly_completed.len(),
            completed = state.completed_targets.len(),
            "profile saved"
        );
        Ok(state)
    }

    fn list(&self) -> Result<Vec<ProfileId>, PersistenceError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_error(&self.dir, source)),
        };
        let mut profiles = Vec::new();
        for entry in entries {
            let path = entry.map_err(|source| io_error(&self.dir, source))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(profile) = ProfileId::parse(stem) {
                profiles.push(profile);
            }
        }
        profiles.sort();
        Ok(profiles)
    }

    fn remove(&self, profile: &ProfileId) -> Result<bool, PersistenceError> {
        let path = self.path_for(profile);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(profile = %profile, "profile removed");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_error(&path, source)),
        }
    }
}

fn io_error(path: &Path, source: io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        source,
    }
}
