use crate::audit::AuditStore;
use crate::cli::ReportArgs;
use crate::config::Config;
use crate::report::{CutoverDecision, JobStatus, WarmingReport};
use anyhow::{Context, Result};
use std::process::ExitCode;
use uuid::Uuid;

pub async fn execute(args: &ReportArgs, config: &Config) -> Result<ExitCode> {
    let audit = AuditStore::open(&config.audit.database_url)
        .await
        .context("Failed to open audit store")?;

    let (report, decision) = match &args.job_id {
        Some(raw) => {
            let job_id = Uuid::parse_str(raw).context("Invalid job id")?;
            (
                audit.report_for(job_id).await?,
                audit.decision_for(job_id).await?,
            )
        }
        None => (audit.latest_report().await?, audit.latest_decision().await?),
    };

    if args.json {
        let payload = serde_json::json!({
            "report": report,
            "decision": decision,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(ExitCode::from(super::EXIT_OK));
    }

    match &report {
        Some(report) => print_report(report),
        None => println!("No warming report recorded."),
    }
    match &decision {
        Some(decision) => print_decision(decision),
        None => println!("No cutover decision recorded."),
    }

    Ok(ExitCode::from(super::EXIT_OK))
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Running => "🔄 RUNNING",
        JobStatus::Completed => "✅ COMPLETED",
        JobStatus::Failed => "❌ FAILED",
        JobStatus::Aborted => "⚠️ ABORTED",
    }
}

pub(crate) fn print_report(report: &WarmingReport) {
    println!("\n=== Warming Report ===\n");
    println!("Job:       {}", report.job_id);
    println!("Status:    {}", status_label(report.status));
    println!("Started:   {}", report.started_at.to_rfc3339());
    println!("Finished:  {}", report.finished_at.to_rfc3339());
    println!();
    println!(
        "{:<16} {:>10} {:>10} {:>8} {:>10} {:>10}",
        "Category", "Attempted", "Succeeded", "Failed", "Duration", "Outcome"
    );
    for stats in &report.categories {
        println!(
            "{:<16} {:>10} {:>10} {:>8} {:>8}ms {:>10}",
            stats.category.to_string(),
            stats.attempted,
            stats.succeeded,
            stats.failed,
            stats.duration_ms,
            stats.outcome.to_string()
        );
    }
    println!();
    println!(
        "Telemetry: keys={}, memory={} bytes, fragmentation={:.2}",
        report.telemetry.total_keys,
        report.telemetry.memory_used_bytes,
        report.telemetry.fragmentation_ratio
    );
}

pub(crate) fn print_decision(decision: &CutoverDecision) {
    println!("\n=== Cutover Decision ===\n");
    println!("Job:       {}", decision.job_id);
    println!(
        "Decision:  {}",
        if decision.passed {
            "✅ PASSED"
        } else {
            "❌ FAILED"
        }
    );
    println!("Decided:   {}", decision.decided_at.to_rfc3339());
    if !decision.reasons.is_empty() {
        println!("Reasons:");
        for reason in &decision.reasons {
            println!("  - {}", reason);
        }
    }
}
