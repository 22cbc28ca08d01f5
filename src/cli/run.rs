use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use action_flow::{AutoConfirmPrompter, RecordPrompter, TerminalPrompter};
use anyhow::{Context, Result};
use cdp_adapter::{AdapterMode, BrowserDriver, ChromiumDriver, MemoryDriver};
use clap::Args;
use optout_core_types::ProfileId;
use optout_scheduler::{metrics, RunOptions};
use optout_state_center::{JsonProfileStore, ProfileStore};
use tracing::{debug, info, warn};

use crate::cli::output::{print_summary, OutputFormat};
use crate::config::Config;
use crate::errors::ConfigurationError;
use crate::identity::{resolve_identity, IdentityInput};
use crate::pipeline::{execute_plan, RunPlan};
use crate::workflows::{load_exclusions, load_workflows, select_targets};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// First name
    #[arg(long = "first")]
    pub first_name: Option<String>,

    /// Last name
    #[arg(long = "last")]
    pub last_name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    /// ZIP / postal code
    #[arg(long)]
    pub zip: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub ssn: Option<String>,

    #[arg(long)]
    pub city: Option<String>,

    /// Full state name or two-letter code
    #[arg(long)]
    pub state: Option<String>,

    /// Profile to load identity and progress from
    #[arg(long)]
    pub profile: Option<String>,

    /// Save identity and completed targets to --profile after the run
    #[arg(long, requires = "profile")]
    pub save_profile: bool,

    /// Run targets the profile already completed
    #[arg(long)]
    pub reset: bool,

    /// Targets to run at the same time (defaults to config)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Workflow directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub workflows: Option<PathBuf>,

    /// Exclusion list file (overrides config)
    #[arg(long, value_name = "FILE")]
    pub exclusions: Option<PathBuf>,

    /// Only run these target ids
    #[arg(long = "only", value_name = "TARGET")]
    pub only: Vec<String>,

    /// Stop starting new targets after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Run the browser headless
    #[arg(long)]
    pub headless: bool,

    /// Skip unparseable workflow files instead of aborting
    #[arg(long)]
    pub skip_malformed: bool,

    /// Record browser commands in memory instead of opening a browser
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    fn identity_input(&self) -> IdentityInput {
        IdentityInput {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            zip: self.zip.clone(),
            phone: self.phone.clone(),
            ssn: self.ssn.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
        }
    }

    fn mode(&self) -> AdapterMode {
        if self.dry_run {
            AdapterMode::Stub
        } else {
            AdapterMode::Real
        }
    }
}

pub async fn cmd_run(args: RunArgs, config: &Config, output: OutputFormat) -> Result<()> {
    let plan = build_plan(&args, config)?;
    let store = JsonProfileStore::new(config.profiles_dir());

    let mode = args.mode();
    let driver: Arc<dyn BrowserDriver> = match mode {
        AdapterMode::Stub => Arc::new(MemoryDriver::new()),
        AdapterMode::Real => {
            let mut browser = config.browser.clone();
            browser.headless |= args.headless;
            let driver = ChromiumDriver::launch(browser)
                .await
                .context("failed to launch browser")?;
            Arc::new(driver)
        }
    };
    let prompter: Arc<dyn RecordPrompter> = if mode.is_stub() {
        Arc::new(AutoConfirmPrompter)
    } else {
        Arc::new(TerminalPrompter::new())
    };

    info!(
        mode = mode.as_str(),
        targets = plan.workflows.len(),
        concurrency = plan.options.concurrency,
        "starting opt-out run"
    );
    let summary = execute_plan(plan, Arc::clone(&driver), prompter, &store).await;

    if let Err(err) = driver.shutdown().await {
        warn!(error = %err, "browser shutdown failed");
    }
    debug!(
        scheduler = ?metrics::snapshot(),
        adapter = ?cdp_adapter::metrics::snapshot(),
        "run counters"
    );

    print_summary(output, &summary)
}

/// Validates everything a run needs before any browser is launched.
fn build_plan(args: &RunArgs, config: &Config) -> Result<RunPlan> {
    let profile = args
        .profile
        .as_deref()
        .map(ProfileId::parse)
        .transpose()
        .map_err(ConfigurationError::from)?;

    let stored = match &profile {
        Some(profile) => {
            let store = JsonProfileStore::new(config.profiles_dir());
            let state = store.load(profile);
            if !state.exists() {
                info!(profile = %profile, "profile has no saved state yet");
            }
            Some(state)
        }
        None => None,
    };
    let identity = resolve_identity(&args.identity_input(), stored.as_ref())?;

    let workflows_dir = args.workflows.as_ref().unwrap_or(&config.workflows_dir);
    let skip_malformed = args.skip_malformed || config.skip_malformed;
    let workflows = select_targets(load_workflows(workflows_dir, skip_malformed)?, &args.only)?;

    let exclusions_file = args.exclusions.as_ref().unwrap_or(&config.exclusions_file);
    let excluded = load_exclusions(exclusions_file)?;

    let concurrency = args.concurrency.unwrap_or(config.default_concurrency);
    let deadline = args
        .deadline_secs
        .map(Duration::from_secs)
        .or_else(|| config.deadline());

    Ok(RunPlan {
        workflows,
        identity,
        profile,
        save_profile: args.save_profile,
        reset: args.reset,
        excluded,
        options: RunOptions::default()
            .with_concurrency(concurrency)
            .with_deadline(deadline),
    })
}
