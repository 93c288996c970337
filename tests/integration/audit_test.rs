//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 审计库集成测试

use chrono::Utc;
use oxwarm::audit::AuditStore;
use oxwarm::record::Category;
use oxwarm::report::{CacheTelemetry, CutoverDecision, JobStatus, WarmingReport};
use oxwarm::warmer::{CategoryOutcome, CategoryStats};
use uuid::Uuid;

#[path = "../common/mod.rs"]
mod common;

fn sample_report(total_keys: u64) -> WarmingReport {
    WarmingReport {
        job_id: Uuid::new_v4(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
        status: JobStatus::Completed,
        categories: vec![CategoryStats {
            category: Category::Catalog,
            attempted: 120,
            succeeded: 118,
            failed: 2,
            duration_ms: 340,
            outcome: CategoryOutcome::Completed,
            sample_keys: vec!["warm:catalog:item-0001".to_string()],
        }],
        telemetry: CacheTelemetry {
            total_keys,
            memory_used_bytes: 1024 * 1024,
            fragmentation_ratio: 1.07,
        },
    }
}

#[tokio::test]
async fn test_report_roundtrip_in_memory() {
    let audit = AuditStore::open("sqlite::memory:").await.unwrap();
    let report = sample_report(118);

    audit.save_report(&report).await.unwrap();

    let loaded = audit.latest_report().await.unwrap().unwrap();
    assert_eq!(loaded.job_id, report.job_id);
    assert_eq!(loaded.status, JobStatus::Completed);
    assert_eq!(loaded.telemetry.total_keys, 118);
    let stats = &loaded.categories[0];
    assert_eq!(stats.attempted, 120);
    assert_eq!(stats.succeeded, 118);
    assert_eq!(stats.failed, 2);
}

#[tokio::test]
async fn test_latest_returns_most_recent_record() {
    let audit = AuditStore::open("sqlite::memory:").await.unwrap();
    let first = sample_report(100);
    let second = sample_report(200);

    audit.save_report(&first).await.unwrap();
    audit.save_report(&second).await.unwrap();

    let latest = audit.latest_report().await.unwrap().unwrap();
    assert_eq!(latest.job_id, second.job_id);
    assert_eq!(latest.telemetry.total_keys, 200);
}

#[tokio::test]
async fn test_lookup_by_job_id() {
    let audit = AuditStore::open("sqlite::memory:").await.unwrap();
    let first = sample_report(100);
    let second = sample_report(200);
    audit.save_report(&first).await.unwrap();
    audit.save_report(&second).await.unwrap();

    let loaded = audit.report_for(first.job_id).await.unwrap().unwrap();
    assert_eq!(loaded.job_id, first.job_id);
    assert_eq!(loaded.telemetry.total_keys, 100);

    assert!(audit
        .report_for(Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_decision_roundtrip() {
    let audit = AuditStore::open("sqlite::memory:").await.unwrap();
    let job_id = Uuid::new_v4();
    let decision = CutoverDecision::new(
        job_id,
        vec!["total key count 3 below threshold min_total_keys=100".to_string()],
    );

    audit.save_decision(&decision).await.unwrap();

    let loaded = audit.decision_for(job_id).await.unwrap().unwrap();
    assert!(!loaded.passed);
    assert_eq!(loaded.reasons, decision.reasons);

    let latest = audit.latest_decision().await.unwrap().unwrap();
    assert_eq!(latest.job_id, job_id);
}

#[tokio::test]
async fn test_empty_store_returns_none() {
    let audit = AuditStore::open("sqlite::memory:").await.unwrap();
    assert!(audit.latest_report().await.unwrap().is_none());
    assert!(audit.latest_decision().await.unwrap().is_none());
}

#[tokio::test]
async fn test_records_survive_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("audit.db").display()
    );
    let report = sample_report(118);

    {
        let audit = AuditStore::open(&url).await.unwrap();
        audit.save_report(&report).await.unwrap();
    }

    let reopened = AuditStore::open(&url).await.unwrap();
    let loaded = reopened.latest_report().await.unwrap().unwrap();
    assert_eq!(loaded.job_id, report.job_id);
}
