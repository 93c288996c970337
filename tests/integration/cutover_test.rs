//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 切流控制器集成测试

use oxwarm::config::{Config, CutoverConfig, ThresholdConfig};
use oxwarm::cutover::{CutoverController, CutoverState};
use oxwarm::gate::ValidationGate;
use oxwarm::orchestrator::WarmingOrchestrator;
use oxwarm::record::Category;
use oxwarm::report::WarmingJob;
use oxwarm::WarmError;
use serial_test::serial;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[path = "../common/mod.rs"]
mod common;

use common::{json_rows, MockCacheStore, MockProvisioner, MockRouter, MockSourceReader};

struct Fixture {
    provisioner: Arc<MockProvisioner>,
    router: Arc<MockRouter>,
    store: Arc<MockCacheStore>,
    controller: CutoverController,
}

fn fixture(config: Config, thresholds: ThresholdConfig) -> Fixture {
    let reader =
        Arc::new(MockSourceReader::new().with_rows(Category::Catalog, json_rows("item", 120)));
    let store = Arc::new(MockCacheStore::default());
    let provisioner = Arc::new(MockProvisioner::default());
    let router = Arc::new(MockRouter::default());

    let orchestrator = WarmingOrchestrator::new(reader, store.clone(), config);
    let gate = ValidationGate::new(thresholds);
    let cutover_config = CutoverConfig {
        active_environment: "blue".to_string(),
        grace_period_secs: 0,
        ..CutoverConfig::default()
    };
    let controller = CutoverController::new(
        provisioner.clone(),
        router.clone(),
        orchestrator,
        gate,
        store.clone(),
        None,
        &cutover_config,
    );

    Fixture {
        provisioner,
        router,
        store,
        controller,
    }
}

fn passing_thresholds() -> ThresholdConfig {
    let mut min_per_category = HashMap::new();
    min_per_category.insert(Category::Catalog, 100);
    ThresholdConfig {
        min_total_keys: 100,
        min_per_category,
    }
}

fn impossible_thresholds() -> ThresholdConfig {
    ThresholdConfig {
        min_total_keys: 1_000_000,
        min_per_category: HashMap::new(),
    }
}

fn job() -> WarmingJob {
    WarmingJob::new(vec![Category::Catalog], 50, 2)
}

#[tokio::test]
#[serial]
async fn test_passed_validation_reaches_active_and_retires_old_env() {
    let f = fixture(common::test_config(), passing_thresholds());

    let outcome = f
        .controller
        .run(job(), false, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.state, CutoverState::Active);
    assert_eq!(f.router.recorded_switches(), vec![(
        "blue".to_string(),
        "env-1".to_string()
    )]);
    // 宽限期后旧环境被销毁，新环境保留
    assert_eq!(f.provisioner.torn_down_envs(), vec!["blue".to_string()]);
    assert!(outcome.decision.unwrap().passed);
    assert!(outcome.path.contains(&CutoverState::CuttingOver));
    assert!(!outcome.path.contains(&CutoverState::RollingBack));
}

#[tokio::test]
#[serial]
async fn test_failed_validation_reaches_retired_never_active() {
    let f = fixture(common::test_config(), impossible_thresholds());

    let outcome = f
        .controller
        .run(job(), false, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.state, CutoverState::Retired);
    // 切流从未发生，现有路由保持不变
    assert!(f.router.recorded_switches().is_empty());
    assert!(!outcome.path.contains(&CutoverState::CuttingOver));
    assert!(!outcome.path.contains(&CutoverState::Active));
    // 新环境被回滚销毁
    assert_eq!(f.provisioner.torn_down_envs(), vec!["env-1".to_string()]);

    let decision = outcome.decision.unwrap();
    assert!(!decision.passed);
    assert!(!decision.reasons.is_empty());
}

#[tokio::test]
#[serial]
async fn test_cutting_over_only_follows_passed_validation() {
    let f = fixture(common::test_config(), passing_thresholds());

    let outcome = f
        .controller
        .run(job(), false, CancellationToken::new())
        .await
        .unwrap();

    let path = &outcome.path;
    let cutting = path
        .iter()
        .position(|s| *s == CutoverState::CuttingOver)
        .unwrap();
    assert_eq!(path[cutting - 1], CutoverState::Validating);
    assert!(outcome.decision.unwrap().passed);
}

#[tokio::test]
#[serial]
async fn test_forced_cutover_overrides_failed_validation() {
    let f = fixture(common::test_config(), impossible_thresholds());

    let outcome = f
        .controller
        .run(job(), true, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.state, CutoverState::Active);
    assert_eq!(f.router.recorded_switches().len(), 1);
    // 越权切流仍然记录失败的校验决定
    assert!(!outcome.decision.unwrap().passed);
}

#[tokio::test]
#[serial]
async fn test_deploy_failure_is_fatal_and_switches_nothing() {
    let f = fixture(common::test_config(), passing_thresholds());
    f.provisioner.fail_deploy.store(true, Ordering::SeqCst);

    let err = f
        .controller
        .run(job(), false, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WarmError::ProvisioningFailed(_)));
    assert!(f.router.recorded_switches().is_empty());
    assert!(f.store.keys().is_empty());
}

#[tokio::test]
#[serial]
async fn test_routing_failure_tears_down_new_environment() {
    let f = fixture(common::test_config(), passing_thresholds());
    f.router.fail.store(true, Ordering::SeqCst);

    let err = f
        .controller
        .run(job(), false, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WarmError::RoutingFailed(_)));
    // 半成品环境总是被销毁，旧环境路由不动
    assert_eq!(f.provisioner.torn_down_envs(), vec!["env-1".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_aborted_warming_job_is_treated_as_failed_validation() {
    let f = fixture(common::test_config(), passing_thresholds());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = f.controller.run(job(), false, cancel).await.unwrap();

    assert_eq!(outcome.state, CutoverState::Retired);
    assert!(f.router.recorded_switches().is_empty());
    let decision = outcome.decision.unwrap();
    assert!(!decision.passed);
    assert!(decision.reasons.iter().any(|r| r.contains("aborted")));
}
