//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了切流校验门：阈值检查与预热后抽样回读。

use crate::config::ThresholdConfig;
use crate::record::Category;
use crate::report::{CutoverDecision, JobStatus, WarmingReport};
use crate::store::CacheStore;
use crate::warmer::CategoryStats;
use std::io::Cursor;
use tracing::{info, instrument, warn};

/// 切流校验门
///
/// 依序检查所有阈值并累积全部未达原因（而非只报第一个）。
/// 除抽样回读外其余检查都是纯函数，保证可确定性测试。
pub struct ValidationGate {
    thresholds: ThresholdConfig,
}

impl ValidationGate {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    /// 纯阈值检查，返回全部未达原因
    pub fn check_thresholds(&self, report: &WarmingReport) -> Vec<String> {
        let mut reasons = Vec::new();

        if report.status != JobStatus::Completed {
            reasons.push(format!(
                "warming job {} finished with status {}, only completed jobs are eligible",
                report.job_id, report.status
            ));
        }

        if report.telemetry.total_keys < self.thresholds.min_total_keys {
            reasons.push(format!(
                "total key count {} below threshold min_total_keys={}",
                report.telemetry.total_keys, self.thresholds.min_total_keys
            ));
        }

        // 按固定类别顺序迭代，保证原因列表确定有序
        for category in Category::ALL {
            let Some(&minimum) = self.thresholds.min_per_category.get(&category) else {
                continue;
            };
            let succeeded = report.stats_for(category).map_or(0, |s| s.succeeded);
            if succeeded < minimum {
                reasons.push(format!(
                    "category {} succeeded {} below threshold min_per_category={}",
                    category, succeeded, minimum
                ));
            }
        }

        reasons
    }

    /// 抽样回读：每类别取一个最近写入的键，确认命中且值可反序列化。
    /// 捕获仅靠计数发现不了的静默损坏。
    async fn live_sample(&self, store: &dyn CacheStore, report: &WarmingReport) -> Vec<String> {
        let mut reasons = Vec::new();

        for stats in &report.categories {
            let Some(key) = pick_sample_key(report, stats) else {
                continue;
            };

            match store.get(key).await {
                Ok(Some(value)) => {
                    if serde_json::from_slice::<serde_json::Value>(&value).is_err() {
                        reasons.push(format!(
                            "live sample for category {} returned undeserializable value at key '{}'",
                            stats.category, key
                        ));
                    }
                }
                Ok(None) => {
                    reasons.push(format!(
                        "live sample for category {} missed recently written key '{}'",
                        stats.category, key
                    ));
                }
                Err(e) => {
                    warn!("Live sample read failed for {}: {}", stats.category, e);
                    reasons.push(format!(
                        "live sample for category {} failed: {}",
                        stats.category, e
                    ));
                }
            }
        }

        reasons
    }

    /// 评估预热报告，产出不可变的切流决定
    #[instrument(skip(self, store, report), level = "info", fields(job_id = %report.job_id))]
    pub async fn validate(&self, store: &dyn CacheStore, report: &WarmingReport) -> CutoverDecision {
        let mut reasons = self.check_thresholds(report);
        reasons.extend(self.live_sample(store, report).await);

        let decision = CutoverDecision::new(report.job_id, reasons);
        if decision.passed {
            info!("Validation passed for job {}", report.job_id);
        } else {
            warn!(
                "Validation failed for job {}: {}",
                report.job_id,
                decision.reasons.join("; ")
            );
        }
        decision
    }
}

/// 在最近写入的键里确定性地挑选一个样本
///
/// 以任务标识哈希选择下标，既避免固定取最后一个键，又保持可复现
fn pick_sample_key<'a>(report: &WarmingReport, stats: &'a CategoryStats) -> Option<&'a String> {
    if stats.sample_keys.is_empty() {
        return None;
    }
    let hash = murmur3::murmur3_32(&mut Cursor::new(report.job_id.as_bytes()), 0).unwrap_or(0);
    stats.sample_keys.get(hash as usize % stats.sample_keys.len())
}
