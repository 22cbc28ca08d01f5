use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

const LOCAL_ENV: &str = "config/local.env";
const LOCAL_CONFIG: &str = "config/config.yaml";

/// What [`load_local_env_overrides`] did. It runs before the subscriber is
/// installed, so the caller logs this afterwards.
#[derive(Debug, Default)]
pub struct EnvOverrides {
    pub path: PathBuf,
    pub found: bool,
    pub applied: usize,
    /// 1-based line numbers that were not `KEY=VALUE`.
    pub invalid_lines: Vec<usize>,
    pub read_error: Option<String>,
}

impl EnvOverrides {
    pub fn log(&self) {
        let path = self.path.display();
        if let Some(err) = &self.read_error {
            warn!(path = %path, error = %err, "failed to read local.env overrides");
            return;
        }
        if !self.found {
            return;
        }
        for line in &self.invalid_lines {
            warn!(path = %path, line, "invalid local.env entry; skipping");
        }
        info!(path = %path, applied = self.applied, "Loaded environment overrides from local.env");
    }
}

/// Applies `KEY=VALUE` lines from `config/local.env`. Variables already set
/// in the environment are left alone.
pub fn load_local_env_overrides() -> EnvOverrides {
    apply_env_file(Path::new(LOCAL_ENV))
}

fn apply_env_file(path: &Path) -> EnvOverrides {
    let mut summary = EnvOverrides {
        path: path.to_path_buf(),
        ..EnvOverrides::default()
    };
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return summary,
        Err(err) => {
            summary.read_error = Some(err.to_string());
            return summary;
        }
    };

    summary.found = true;
    for (idx, line) in contents.lines().enumerate() {
        match parse_env_line(line) {
            EnvLine::Blank => {}
            EnvLine::Invalid => summary.invalid_lines.push(idx + 1),
            EnvLine::Pair(key, value) => {
                if env::var_os(key).is_none() {
                    env::set_var(key, value);
                    summary.applied += 1;
                }
            }
        }
    }
    summary
}

#[derive(Debug, PartialEq, Eq)]
enum EnvLine<'a> {
    Blank,
    Invalid,
    Pair(&'a str, String),
}

fn parse_env_line(raw: &str) -> EnvLine<'_> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return EnvLine::Blank;
    }
    match line.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            EnvLine::Pair(key.trim(), unquote(value.trim()))
        }
        _ => EnvLine::Invalid,
    }
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t"),
        None => value.to_string(),
    }
}

/// `--debug` wins over `--log-level`; `RUST_LOG` wins over both. Output goes
/// to stderr so `--output json` stays parseable.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

/// `--config`, then `./config/config.yaml`, then the user config dir.
fn config_path(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Ok(local);
    }
    let dir = dirs::config_dir().context("Failed to get config directory")?;
    Ok(dir.join("optout").join("config.yaml"))
}

pub async fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = config_path(explicit)?;

    let config = match fs::read_to_string(&path).await {
        Ok(content) => {
            let config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("Config file not found, using defaults: {}", path.display());
            Config::default()
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to read config file {}", path.display()))
        }
    };

    config.validate()?;
    Ok(LoadedConfig { config, path })
}
