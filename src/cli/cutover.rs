use crate::audit::AuditStore;
use crate::cli::CutoverArgs;
use crate::config::Config;
use crate::cutover::{CommandProvisioner, CommandRouter, CutoverController, CutoverState};
use crate::gate::ValidationGate;
use crate::orchestrator::WarmingOrchestrator;
use crate::report::WarmingJob;
use crate::source::SqlSourceReader;
use crate::store::RedisStore;
use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn execute(args: &CutoverArgs, config: &Config) -> Result<ExitCode> {
    let categories = super::parse_categories(&args.categories)?;

    let provisioner = Arc::new(CommandProvisioner::new(&config.cutover)?);
    let router = Arc::new(CommandRouter::new(&config.cutover)?);

    let reader = Arc::new(
        SqlSourceReader::connect(&config.source)
            .await
            .context("Failed to connect to relational source")?,
    );
    let store: Arc<RedisStore> = Arc::new(
        RedisStore::connect(&config.cache)
            .await
            .context("Failed to connect to cache store")?,
    );
    let audit = Arc::new(
        AuditStore::open(&config.audit.database_url)
            .await
            .context("Failed to open audit store")?,
    );

    let orchestrator = WarmingOrchestrator::new(reader, store.clone(), config.clone());
    let gate = ValidationGate::new(config.thresholds.clone());
    let controller = CutoverController::new(
        provisioner,
        router,
        orchestrator,
        gate,
        store,
        Some(audit),
        &config.cutover,
    );

    let job = WarmingJob::new(categories, config.warming.batch_size, config.warming.max_retries);
    let job_id = job.job_id;

    if args.force {
        println!("⚠️ Forced cutover requested: validation failures will not block traffic switch.");
    }
    println!("Starting cutover with warming job {}...", job_id);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nAbort requested, warming will stop at the next batch boundary...");
            signal_cancel.cancel();
        }
    });

    let outcome = controller.run(job, args.force, cancel).await?;

    if let Some(report) = &outcome.report {
        super::report::print_report(report);
    }
    if let Some(decision) = &outcome.decision {
        super::report::print_decision(decision);
    }

    println!();
    match outcome.state {
        CutoverState::Active => {
            println!(
                "✅ Cutover complete. Traffic is served by environment '{}'.",
                outcome.new_environment.as_deref().unwrap_or("unknown")
            );
            Ok(ExitCode::from(super::EXIT_OK))
        }
        _ => {
            println!("❌ Cutover retired. Existing traffic routing is untouched.");
            Ok(ExitCode::from(super::EXIT_FAILURE))
        }
    }
}
