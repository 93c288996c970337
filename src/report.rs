//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了预热任务、预热报告与切流决定等核心数据模型。

use crate::record::Category;
use crate::warmer::CategoryStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 预热任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Aborted,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => f.write_str("running"),
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Failed => f.write_str("failed"),
            JobStatus::Aborted => f.write_str("aborted"),
        }
    }
}

/// 预热任务
///
/// 每次调用编排器对应一个任务；创建后仅由编排器修改状态，
/// 全部类别结束或任务被中止后即为终态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmingJob {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub categories: Vec<Category>,
    pub batch_size: u64,
    pub max_retries: u32,
    pub status: JobStatus,
}

impl WarmingJob {
    pub fn new(categories: Vec<Category>, batch_size: u64, max_retries: u32) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            started_at: Utc::now(),
            categories,
            batch_size,
            max_retries,
            status: JobStatus::Running,
        }
    }
}

/// 预热完成后采样一次的缓存全局遥测
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheTelemetry {
    pub total_keys: u64,
    pub memory_used_bytes: u64,
    pub fragmentation_ratio: f64,
}

/// 预热报告
///
/// 全部类别统计加一次性缓存遥测；生成后不可变，供校验门消费
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmingReport {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobStatus,
    pub categories: Vec<CategoryStats>,
    pub telemetry: CacheTelemetry,
}

impl WarmingReport {
    /// 查找指定类别的统计
    pub fn stats_for(&self, category: Category) -> Option<&CategoryStats> {
        self.categories.iter().find(|s| s.category == category)
    }

    /// 全类别成功写入总数
    pub fn total_succeeded(&self) -> u64 {
        self.categories.iter().map(|s| s.succeeded).sum()
    }
}

/// 切流决定
///
/// 由一份预热报告与配置阈值派生；不可变，落库供审计，
/// 创建后不再重评（重跑总是产生新任务与新决定）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutoverDecision {
    pub job_id: Uuid,
    pub passed: bool,
    pub reasons: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

impl CutoverDecision {
    pub fn new(job_id: Uuid, reasons: Vec<String>) -> Self {
        Self {
            job_id,
            passed: reasons.is_empty(),
            reasons,
            decided_at: Utc::now(),
        }
    }
}
