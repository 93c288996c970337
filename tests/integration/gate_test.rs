//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 切流校验门集成测试

use oxwarm::config::ThresholdConfig;
use oxwarm::gate::ValidationGate;
use oxwarm::orchestrator::WarmingOrchestrator;
use oxwarm::record::Category;
use oxwarm::report::{WarmingJob, WarmingReport};
use serial_test::serial;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[path = "../common/mod.rs"]
mod common;

use common::{json_rows, MockCacheStore, MockSourceReader};

async fn warm_catalog(store: Arc<MockCacheStore>, rows: usize) -> WarmingReport {
    let reader =
        Arc::new(MockSourceReader::new().with_rows(Category::Catalog, json_rows("item", rows)));
    let orchestrator = WarmingOrchestrator::new(reader, store, common::test_config());
    let mut job = WarmingJob::new(vec![Category::Catalog], 50, 2);
    orchestrator
        .run(&mut job, CancellationToken::new())
        .await
        .unwrap()
}

fn gate(min_total: u64, per_category: &[(Category, u64)]) -> ValidationGate {
    let mut min_per_category = HashMap::new();
    for &(category, minimum) in per_category {
        min_per_category.insert(category, minimum);
    }
    ValidationGate::new(ThresholdConfig {
        min_total_keys: min_total,
        min_per_category,
    })
}

#[tokio::test]
#[serial]
async fn test_healthy_warm_cache_passes_with_empty_reasons() {
    let store = Arc::new(MockCacheStore::default());
    let report = warm_catalog(store.clone(), 120).await;

    let decision = gate(100, &[(Category::Catalog, 100)])
        .validate(store.as_ref(), &report)
        .await;

    assert!(decision.passed);
    assert!(decision.reasons.is_empty());
    assert_eq!(decision.job_id, report.job_id);
}

#[tokio::test]
#[serial]
async fn test_total_keys_below_threshold_fails_with_named_reason() {
    let store = Arc::new(MockCacheStore::default());
    let report = warm_catalog(store.clone(), 10).await;

    let decision = gate(10_000, &[]).validate(store.as_ref(), &report).await;

    assert!(!decision.passed);
    assert!(decision
        .reasons
        .iter()
        .any(|r| r.contains("min_total_keys=10000")));
}

#[tokio::test]
#[serial]
async fn test_live_sample_catches_silent_corruption() {
    let store = Arc::new(MockCacheStore::default());
    let report = warm_catalog(store.clone(), 60).await;

    // 计数全部正常，但缓存里的值已经损坏
    store.corrupt_all();

    let decision = gate(1, &[(Category::Catalog, 50)])
        .validate(store.as_ref(), &report)
        .await;

    assert!(!decision.passed);
    assert!(decision
        .reasons
        .iter()
        .any(|r| r.contains("undeserializable")));
}

#[tokio::test]
#[serial]
async fn test_live_sample_catches_flushed_cache() {
    let store = Arc::new(MockCacheStore::default());
    let report = warm_catalog(store.clone(), 60).await;

    // 预热后缓存被清空：计数阈值仍引用报告遥测，抽样必须失败
    store.flush();

    let decision = gate(1, &[]).validate(store.as_ref(), &report).await;

    assert!(!decision.passed);
    assert!(decision
        .reasons
        .iter()
        .any(|r| r.contains("missed recently written key")));
}

#[tokio::test]
#[serial]
async fn test_all_failing_checks_are_accumulated() {
    let store = Arc::new(MockCacheStore::default());
    let report = warm_catalog(store.clone(), 10).await;
    store.flush();

    let decision = gate(10_000, &[(Category::Catalog, 500), (Category::Reference, 5)])
        .validate(store.as_ref(), &report)
        .await;

    assert!(!decision.passed);
    // 键总数、两个类别阈值、抽样未命中全部出现在原因里
    assert!(decision.reasons.len() >= 4);
}
