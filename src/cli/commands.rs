use clap::Subcommand;

use super::profile::ProfileArgs;
use super::run::RunArgs;
use super::targets::TargetsArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run opt-out workflows for one identity
    Run(RunArgs),

    /// List discovered workflows and whether they are excluded
    Targets(TargetsArgs),

    /// Inspect or delete saved profiles
    Profile(ProfileArgs),
}
