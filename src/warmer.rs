//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了单类别预热器及其统计累积。

use crate::error::WarmError;
use crate::record::{transform, CacheRecord, Category};
use crate::retry::{retry_with_backoff, ErrorClass, RetryPolicy};
use crate::source::SourceReader;
use crate::ttl::TtlPolicy;
use crate::writer::CacheWriter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// 校验采样保留的最近写入键数量
const SAMPLE_KEY_LIMIT: usize = 16;

/// 类别预热的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryOutcome {
    /// 读尽全部批次后正常结束
    Completed,
    /// 数据源重试耗尽、超时或任务被取消
    Aborted,
}

impl std::fmt::Display for CategoryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategoryOutcome::Completed => f.write_str("completed"),
            CategoryOutcome::Aborted => f.write_str("aborted"),
        }
    }
}

/// 单类别统计
///
/// 执行期间由所属预热器独占持有，并入报告后只读。
/// 任何时刻都满足 `attempted = succeeded + failed`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: Category,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub duration_ms: u64,
    pub outcome: CategoryOutcome,
    /// 最近成功写入的键，供校验门抽样回读
    pub sample_keys: Vec<String>,
}

impl CategoryStats {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            duration_ms: 0,
            outcome: CategoryOutcome::Completed,
            sample_keys: Vec::new(),
        }
    }

    /// 未能启动或执行环境丢失时的终态统计
    pub fn aborted(category: Category) -> Self {
        Self {
            outcome: CategoryOutcome::Aborted,
            ..Self::new(category)
        }
    }

    fn push_sample(&mut self, key: String) {
        if self.sample_keys.len() == SAMPLE_KEY_LIMIT {
            self.sample_keys.remove(0);
        }
        self.sample_keys.push(key);
    }
}

fn classify_source_error(e: &WarmError) -> ErrorClass {
    match e {
        WarmError::SourceUnavailable(_) | WarmError::QueryTimeout(_) => ErrorClass::Retryable,
        _ => ErrorClass::Fatal,
    }
}

/// 单类别预热器
///
/// 顺序分页读取直到收到空批次；批内逐行转换、计算TTL并写入缓存，
/// 每行的成败都计入统计，绝不静默丢行。单行失败不会中止类别；
/// 只有数据源重试耗尽才以Aborted终止，且不影响其他类别。
pub struct CategoryWarmer {
    category: Category,
    reader: Arc<dyn SourceReader>,
    writer: CacheWriter,
    ttl: TtlPolicy,
    batch_size: u64,
    source_retry: RetryPolicy,
    timeout: Duration,
    cancel: CancellationToken,
}

impl CategoryWarmer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        category: Category,
        reader: Arc<dyn SourceReader>,
        writer: CacheWriter,
        ttl: TtlPolicy,
        batch_size: u64,
        source_retry: RetryPolicy,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            category,
            reader,
            writer,
            ttl,
            batch_size,
            source_retry,
            timeout,
            cancel,
        }
    }

    /// 执行预热，总是返回统计（错误在内部转化为计数或Aborted终态）
    #[instrument(skip(self), level = "info", fields(category = %self.category))]
    pub async fn run(self) -> CategoryStats {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut stats = CategoryStats::new(self.category);
        let mut aborted = false;
        let mut offset = 0u64;

        loop {
            // 取消信号与类别超时都只在批次边界生效，在途写入照常完成
            if self.cancel.is_cancelled() {
                info!("Category {} cancelled at offset {}", self.category, offset);
                aborted = true;
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    "Category {} exceeded its {}s deadline, aborting at offset {}",
                    self.category,
                    self.timeout.as_secs(),
                    offset
                );
                aborted = true;
                break;
            }

            let batch = match retry_with_backoff(&self.source_retry, classify_source_error, || {
                self.reader.read(self.category, offset, self.batch_size)
            })
            .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Aborting category {}: {}", self.category, e);
                    aborted = true;
                    break;
                }
            };

            if batch.is_empty() {
                debug!(
                    "Category {} exhausted after {} rows",
                    self.category, stats.attempted
                );
                break;
            }

            let fetched = batch.len() as u64;
            for row in &batch.rows {
                stats.attempted += 1;

                let draft = match transform(row, self.category) {
                    Ok(draft) => draft,
                    Err(e) => {
                        debug!("Skipping row in {}: {}", self.category, e);
                        stats.failed += 1;
                        continue;
                    }
                };

                let ttl_seconds = self.ttl.compute(self.category, draft.popularity);
                let record = CacheRecord::assemble(self.category, draft, ttl_seconds);

                match self.writer.write(&record).await {
                    Ok(()) => {
                        stats.succeeded += 1;
                        stats.push_sample(record.key);
                    }
                    Err(e) => {
                        warn!("Write failed for {}: {}", record.key, e);
                        stats.failed += 1;
                    }
                }
            }

            offset += fetched;
        }

        stats.outcome = if aborted {
            CategoryOutcome::Aborted
        } else {
            CategoryOutcome::Completed
        };
        stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            "Category {} finished: outcome={}, attempted={}, succeeded={}, failed={}",
            self.category, stats.outcome, stats.attempted, stats.succeeded, stats.failed
        );
        stats
    }
}
