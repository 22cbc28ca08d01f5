use super::env::CliArgs;
use super::profile::cmd_profile;
use super::run::cmd_run;
use super::targets::cmd_targets;
use crate::cli::commands::Commands;
use crate::config::Config;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, config: &Config) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, config, cli.output).await,
        Commands::Targets(args) => cmd_targets(args, config, cli.output).await,
        Commands::Profile(args) => cmd_profile(args, config, cli.output).await,
    }
}
