use anyhow::Result;
use clap::ValueEnum;
use optout_scheduler::{RunOutcome, RunReport};
use serde::Serialize;

use crate::pipeline::RunSummary;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Prints `payload` in the machine formats. Returns false for `Human` so the
/// caller can render its own table.
pub fn emit<T: Serialize>(format: OutputFormat, payload: &T) -> Result<bool> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(payload)?),
        OutputFormat::Human => return Ok(false),
    }
    Ok(true)
}

#[derive(Serialize)]
struct SummaryPayload<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    counts: optout_scheduler::OutcomeCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a str>,
    saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    save_error: Option<&'a str>,
}

pub fn print_summary(format: OutputFormat, summary: &RunSummary) -> Result<()> {
    let payload = SummaryPayload {
        report: &summary.report,
        counts: summary.report.counts(),
        profile: summary.saved.as_ref().map(|state| state.profile.as_str()),
        saved: summary.saved.is_some(),
        save_error: summary.save_error.as_deref(),
    };
    if emit(format, &payload)? {
        return Ok(());
    }

    print_report_table(&summary.report);
    if let Some(state) = &summary.saved {
        println!(
            "Progress saved to profile '{}' ({} completed target(s))",
            state.profile,
            state.completed_targets.len()
        );
    }
    if let Some(err) = &summary.save_error {
        eprintln!("warning: progress was not saved: {err}");
    }
    Ok(())
}

fn print_report_table(report: &RunReport) {
    if report.outcomes.is_empty() {
        println!("No targets to run.");
        return;
    }

    let width = report
        .outcomes
        .iter()
        .map(|entry| entry.target.as_str().len())
        .max()
        .unwrap_or(6)
        .max(6);
    println!("{:<width$}  {:<9}  {:>8}  DETAIL", "TARGET", "STATUS", "MS");
    for entry in &report.outcomes {
        let detail = match &entry.outcome {
            RunOutcome::Completed => String::new(),
            RunOutcome::Failed { reason } => reason.clone(),
            RunOutcome::Skipped { reason } => reason.to_string(),
        };
        println!(
            "{:<width$}  {:<9}  {:>8}  {}",
            entry.target.as_str(),
            entry.outcome.label(),
            entry.elapsed_ms,
            detail
        );
    }

    let counts = report.counts();
    println!(
        "\n{} completed, {} failed, {} skipped in {} ms (concurrency {}/{}, peak {})",
        counts.completed,
        counts.failed,
        counts.skipped,
        report.elapsed_ms,
        report.effective_concurrency,
        report.requested_concurrency,
        report.peak_in_flight
    );
}
