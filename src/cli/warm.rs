use crate::audit::AuditStore;
use crate::cli::WarmArgs;
use crate::config::Config;
use crate::orchestrator::WarmingOrchestrator;
use crate::report::{JobStatus, WarmingJob};
use crate::source::SqlSourceReader;
use crate::store::RedisStore;
use crate::warmer::CategoryOutcome;
use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn execute(args: &WarmArgs, config: &Config) -> Result<ExitCode> {
    let categories = super::parse_categories(&args.categories)?;

    let reader = Arc::new(
        SqlSourceReader::connect(&config.source)
            .await
            .context("Failed to connect to relational source")?,
    );
    let store = Arc::new(
        RedisStore::connect(&config.cache)
            .await
            .context("Failed to connect to cache store")?,
    );
    let audit = AuditStore::open(&config.audit.database_url)
        .await
        .context("Failed to open audit store")?;

    let orchestrator = WarmingOrchestrator::new(reader, store, config.clone());
    let mut job = WarmingJob::new(
        categories,
        args.batch_size.unwrap_or(config.warming.batch_size),
        args.max_retries.unwrap_or(config.warming.max_retries),
    );

    println!("Starting warming job {}...", job.job_id);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nAbort requested, letting in-flight writes finish...");
            signal_cancel.cancel();
        }
    });

    let report = orchestrator.run(&mut job, cancel).await?;
    audit.save_report(&report).await?;

    super::report::print_report(&report);

    let any_aborted = report
        .categories
        .iter()
        .any(|s| s.outcome == CategoryOutcome::Aborted);
    let code = match report.status {
        JobStatus::Completed if !any_aborted => super::EXIT_OK,
        JobStatus::Completed => super::EXIT_PARTIAL,
        _ => super::EXIT_FAILURE,
    };
    Ok(ExitCode::from(code))
}
