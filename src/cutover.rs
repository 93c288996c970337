//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了切流控制器：部署、预热、校验、切流或回滚的状态机，
//! 以及基础设施与流量路由的提供者接口。

use crate::audit::AuditStore;
use crate::config::CutoverConfig;
use crate::error::{Result, WarmError};
use crate::gate::ValidationGate;
use crate::orchestrator::WarmingOrchestrator;
use crate::report::{CutoverDecision, WarmingJob, WarmingReport};
use crate::store::CacheStore;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// 基础设施提供者trait
///
/// 部署与销毁环境的黑盒接口；部署失败时提供者自行清理半成品环境
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// 部署新环境，返回环境标识
    async fn deploy_environment(&self) -> Result<String>;

    /// 销毁指定环境
    async fn teardown_environment(&self, env_id: &str) -> Result<()>;
}

/// 流量路由trait
#[async_trait]
pub trait TrafficRouter: Send + Sync {
    /// 把流量从旧环境切到新环境
    async fn switch_traffic(&self, from: &str, to: &str) -> Result<()>;
}

async fn run_shell(command: &str) -> std::io::Result<std::process::Output> {
    tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .await
}

/// 基于外部命令的默认基础设施提供者
///
/// 部署命令的stdout最后一个非空行作为新环境标识
pub struct CommandProvisioner {
    deploy_command: String,
    teardown_command: String,
}

impl CommandProvisioner {
    pub fn new(config: &CutoverConfig) -> Result<Self> {
        if config.deploy_command.is_empty() || config.teardown_command.is_empty() {
            return Err(WarmError::ConfigError(
                "cutover.deploy_command and cutover.teardown_command must be configured"
                    .to_string(),
            ));
        }
        Ok(Self {
            deploy_command: config.deploy_command.clone(),
            teardown_command: config.teardown_command.clone(),
        })
    }
}

#[async_trait]
impl Provisioner for CommandProvisioner {
    async fn deploy_environment(&self) -> Result<String> {
        let output = run_shell(&self.deploy_command)
            .await
            .map_err(|e| WarmError::ProvisioningFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(WarmError::ProvisioningFailed(format!(
                "deploy command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                WarmError::ProvisioningFailed(
                    "deploy command produced no environment id on stdout".to_string(),
                )
            })
    }

    async fn teardown_environment(&self, env_id: &str) -> Result<()> {
        let command = self.teardown_command.replace("{env}", env_id);
        let output = run_shell(&command)
            .await
            .map_err(|e| WarmError::ProvisioningFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(WarmError::ProvisioningFailed(format!(
                "teardown of '{}' exited with {}: {}",
                env_id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// 基于外部命令的默认流量路由
pub struct CommandRouter {
    switch_command: String,
}

impl CommandRouter {
    pub fn new(config: &CutoverConfig) -> Result<Self> {
        if config.switch_command.is_empty() {
            return Err(WarmError::ConfigError(
                "cutover.switch_command must be configured".to_string(),
            ));
        }
        Ok(Self {
            switch_command: config.switch_command.clone(),
        })
    }
}

#[async_trait]
impl TrafficRouter for CommandRouter {
    async fn switch_traffic(&self, from: &str, to: &str) -> Result<()> {
        let command = self
            .switch_command
            .replace("{from}", from)
            .replace("{to}", to);
        let output = run_shell(&command)
            .await
            .map_err(|e| WarmError::RoutingFailed(e.to_string()))?;
        if !output.status.success() {
            return Err(WarmError::RoutingFailed(format!(
                "switch command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// 切流状态机的状态
///
/// `CuttingOver` 只能从校验通过的 `Validating` 到达
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoverState {
    Deploying,
    Warming,
    Validating,
    CuttingOver,
    Active,
    RollingBack,
    Retired,
}

impl std::fmt::Display for CutoverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CutoverState::Deploying => "deploying",
            CutoverState::Warming => "warming",
            CutoverState::Validating => "validating",
            CutoverState::CuttingOver => "cutting_over",
            CutoverState::Active => "active",
            CutoverState::RollingBack => "rolling_back",
            CutoverState::Retired => "retired",
        };
        f.write_str(label)
    }
}

/// 一次切流尝试的结果
///
/// 终态只会是 `Active` 或 `Retired`，不存在中间路由状态
#[derive(Debug)]
pub struct CutoverOutcome {
    pub state: CutoverState,
    /// 经过的状态序列，供审计与排障
    pub path: Vec<CutoverState>,
    pub new_environment: Option<String>,
    pub report: Option<WarmingReport>,
    pub decision: Option<CutoverDecision>,
}

/// 切流控制器
///
/// 部署新环境、对其预热、咨询校验门，然后要么切流、要么销毁新环境。
/// 没有 `passed = true` 的决定绝不切流；强制切流是显式的独立授权动作。
pub struct CutoverController {
    provisioner: Arc<dyn Provisioner>,
    router: Arc<dyn TrafficRouter>,
    orchestrator: WarmingOrchestrator,
    gate: ValidationGate,
    store: Arc<dyn CacheStore>,
    audit: Option<Arc<AuditStore>>,
    active_environment: String,
    grace_period: Duration,
}

impl CutoverController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        router: Arc<dyn TrafficRouter>,
        orchestrator: WarmingOrchestrator,
        gate: ValidationGate,
        store: Arc<dyn CacheStore>,
        audit: Option<Arc<AuditStore>>,
        config: &CutoverConfig,
    ) -> Self {
        Self {
            provisioner,
            router,
            orchestrator,
            gate,
            store,
            audit,
            active_environment: config.active_environment.clone(),
            grace_period: Duration::from_secs(config.grace_period_secs),
        }
    }

    fn advance(path: &mut Vec<CutoverState>, state: CutoverState) {
        info!("Cutover state: {}", state);
        path.push(state);
    }

    async fn save_report(&self, report: &WarmingReport) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.save_report(report).await {
                warn!("Failed to persist warming report: {}", e);
            }
        }
    }

    async fn save_decision(&self, decision: &CutoverDecision) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.save_decision(decision).await {
                warn!("Failed to persist cutover decision: {}", e);
            }
        }
    }

    async fn teardown(&self, env_id: &str) {
        if let Err(e) = self.provisioner.teardown_environment(env_id).await {
            warn!("Teardown of environment '{}' failed: {}", env_id, e);
        }
    }

    /// 端到端执行一次切流
    ///
    /// `force` 为真时即使校验失败也继续切流（人工越权路径）
    #[instrument(skip(self, job, cancel), level = "info", fields(job_id = %job.job_id))]
    pub async fn run(
        &self,
        mut job: WarmingJob,
        force: bool,
        cancel: CancellationToken,
    ) -> Result<CutoverOutcome> {
        let mut path = Vec::new();

        Self::advance(&mut path, CutoverState::Deploying);
        let new_environment = self.provisioner.deploy_environment().await?;
        info!("Deployed candidate environment '{}'", new_environment);

        Self::advance(&mut path, CutoverState::Warming);
        let report = match self.orchestrator.run(&mut job, cancel).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Warming failed, tearing down '{}'", new_environment);
                self.teardown(&new_environment).await;
                return Err(e);
            }
        };
        self.save_report(&report).await;

        Self::advance(&mut path, CutoverState::Validating);
        let decision = self.gate.validate(self.store.as_ref(), &report).await;
        self.save_decision(&decision).await;

        if !decision.passed && !force {
            Self::advance(&mut path, CutoverState::RollingBack);
            self.teardown(&new_environment).await;
            Self::advance(&mut path, CutoverState::Retired);
            info!(
                "Cutover retired, existing routing untouched. Reasons: {}",
                decision.reasons.join("; ")
            );
            return Ok(CutoverOutcome {
                state: CutoverState::Retired,
                path,
                new_environment: Some(new_environment),
                report: Some(report),
                decision: Some(decision),
            });
        }

        if !decision.passed {
            warn!(
                "Manual override: cutting over despite failed validation ({})",
                decision.reasons.join("; ")
            );
        }

        Self::advance(&mut path, CutoverState::CuttingOver);
        if let Err(e) = self
            .router
            .switch_traffic(&self.active_environment, &new_environment)
            .await
        {
            warn!("Traffic switch failed, tearing down '{}'", new_environment);
            Self::advance(&mut path, CutoverState::RollingBack);
            self.teardown(&new_environment).await;
            Self::advance(&mut path, CutoverState::Retired);
            return Err(e);
        }

        Self::advance(&mut path, CutoverState::Active);
        info!(
            "Traffic now served by '{}'; retiring '{}' after {}s grace period",
            new_environment,
            self.active_environment,
            self.grace_period.as_secs()
        );

        // 宽限期让旧路径的在途请求自然完成
        tokio::time::sleep(self.grace_period).await;
        self.teardown(&self.active_environment).await;

        Ok(CutoverOutcome {
            state: CutoverState::Active,
            path,
            new_environment: Some(new_environment),
            report: Some(report),
            decision: Some(decision),
        })
    }
}
