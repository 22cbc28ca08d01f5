//! Configuration file model
//!
//! Every key is optional; a missing file means all defaults.

use std::path::PathBuf;
use std::time::Duration;

use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one `*.yaml` workflow per target.
    pub workflows_dir: PathBuf,
    /// Target ids never to run, one per line. Missing file means none.
    pub exclusions_file: PathBuf,
    /// Where profile progress files live. Defaults under the user data dir.
    pub profiles_dir: Option<PathBuf>,
    /// Values outside `1..=targets` are clamped when the run starts.
    pub default_concurrency: usize,
    /// Log and skip unparseable workflow files instead of aborting.
    pub skip_malformed: bool,
    pub deadline_secs: Option<u64>,
    pub browser: CdpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflows_dir: PathBuf::from("workflows"),
            exclusions_file: PathBuf::from("workflows/exclusions.txt"),
            profiles_dir: None,
            default_concurrency: 1,
            skip_malformed: false,
            deadline_secs: None,
            browser: CdpConfig::default(),
        }
    }
}

impl Config {
    pub fn profiles_dir(&self) -> PathBuf {
        if let Some(dir) = &self.profiles_dir {
            return dir.clone();
        }
        match dirs::data_dir() {
            Some(mut dir) => {
                dir.push("optout");
                dir.push("profiles");
                dir
            }
            None => PathBuf::from("profiles"),
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.browser.action_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid(
                "browser.action_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
