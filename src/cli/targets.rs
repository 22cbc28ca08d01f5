use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{emit, OutputFormat};
use crate::config::Config;
use crate::workflows::{load_exclusions, load_workflows};

#[derive(Args, Clone, Debug)]
pub struct TargetsArgs {
    /// Workflow directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub workflows: Option<PathBuf>,

    /// Exclusion list file (overrides config)
    #[arg(long, value_name = "FILE")]
    pub exclusions: Option<PathBuf>,

    /// Skip unparseable workflow files instead of aborting
    #[arg(long)]
    pub skip_malformed: bool,
}

#[derive(Debug, Serialize)]
struct TargetRow {
    id: String,
    name: String,
    steps: usize,
    excluded: bool,
}

pub async fn cmd_targets(args: TargetsArgs, config: &Config, output: OutputFormat) -> Result<()> {
    let dir = args.workflows.as_ref().unwrap_or(&config.workflows_dir);
    let workflows = load_workflows(dir, args.skip_malformed || config.skip_malformed)?;
    let excluded =
        load_exclusions(args.exclusions.as_ref().unwrap_or(&config.exclusions_file))?;

    let rows: Vec<TargetRow> = workflows
        .into_iter()
        .map(|workflow| TargetRow {
            excluded: excluded.contains(&workflow.id),
            id: workflow.id.to_string(),
            name: workflow.name,
            steps: workflow.steps.len(),
        })
        .collect();

    if emit(output, &rows)? {
        return Ok(());
    }
    if rows.is_empty() {
        println!("No workflows found in {}", dir.display());
        return Ok(());
    }
    let width = rows.iter().map(|row| row.id.len()).max().unwrap_or(2).max(2);
    println!("{:<width$}  {:>5}  {:<8}  NAME", "ID", "STEPS", "EXCLUDED");
    for row in &rows {
        println!(
            "{:<width$}  {:>5}  {:<8}  {}",
            row.id,
            row.steps,
            if row.excluded { "yes" } else { "no" },
            row.name
        );
    }
    Ok(())
}
