//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了预热编排器：类别扇出、并发上限、遥测采样与报告组装。

use crate::config::Config;
use crate::error::{Result, WarmError};
use crate::record::Category;
use crate::report::{CacheTelemetry, JobStatus, WarmingJob, WarmingReport};
use crate::retry::RetryPolicy;
use crate::source::SourceReader;
use crate::store::CacheStore;
use crate::ttl::TtlPolicy;
use crate::warmer::{CategoryStats, CategoryWarmer};
use crate::writer::CacheWriter;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use lazy_static::lazy_static;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

lazy_static! {
    /// 进行中类别登记表
    ///
    /// 与进行中任务类别重叠的新任务会被拒绝，而不是猜测合并语义
    static ref IN_PROGRESS: DashMap<Category, Uuid> = DashMap::new();
}

/// 类别占用凭据，释放时归还全部类别
struct CategoryClaim {
    categories: Vec<Category>,
}

impl Drop for CategoryClaim {
    fn drop(&mut self) {
        for category in &self.categories {
            IN_PROGRESS.remove(category);
        }
    }
}

fn claim_categories(job_id: Uuid, categories: &[Category]) -> Result<CategoryClaim> {
    let mut claimed = Vec::new();
    for &category in categories {
        match IN_PROGRESS.entry(category) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                let holder = *entry.get();
                drop(entry);
                for c in &claimed {
                    IN_PROGRESS.remove(c);
                }
                return Err(WarmError::JobConflict(format!(
                    "Category {} is already being warmed by job {}",
                    category, holder
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(job_id);
                claimed.push(category);
            }
        }
    }
    Ok(CategoryClaim { categories: claimed })
}

/// 预热编排器
///
/// 每个请求的类别启动一个预热器，受信号量约束并发（每个预热器
/// 各占一路源库与缓存连接）。等待全部类别到达终态后采样一次
/// 缓存遥测并组装报告。部分类别Aborted是可上报的正常结果；
/// 只有全类别零成功才判整个任务失败。
pub struct WarmingOrchestrator {
    reader: Arc<dyn SourceReader>,
    store: Arc<dyn CacheStore>,
    config: Config,
}

impl WarmingOrchestrator {
    pub fn new(reader: Arc<dyn SourceReader>, store: Arc<dyn CacheStore>, config: Config) -> Self {
        Self {
            reader,
            store,
            config,
        }
    }

    /// 执行预热任务
    ///
    /// 除类别冲突、配置错误与缓存整库不可达外，其余故障都体现为
    /// 报告中的计数与终态，而不是错误返回
    #[instrument(skip(self, job, cancel), level = "info", fields(job_id = %job.job_id))]
    pub async fn run(
        &self,
        job: &mut WarmingJob,
        cancel: CancellationToken,
    ) -> Result<WarmingReport> {
        if job.categories.is_empty() {
            return Err(WarmError::ConfigError(
                "Warming job requests no categories".to_string(),
            ));
        }

        let _claim = claim_categories(job.job_id, &job.categories)?;

        // 缓存整库不可达对整个任务致命，开工前探测一次
        self.store.ping().await?;

        info!(
            "Starting warming job {} over {} categories (batch_size={}, max_retries={})",
            job.job_id,
            job.categories.len(),
            job.batch_size,
            job.max_retries
        );

        let ttl = TtlPolicy::new(self.config.ttl.clone());
        let retry = RetryPolicy::new(job.max_retries, self.config.warming.retry_base_delay_ms);
        let writer = CacheWriter::new(self.store.clone(), retry.clone(), &self.config.cache);
        let semaphore = Arc::new(Semaphore::new(self.config.warming.max_parallelism));

        let mut handles = Vec::with_capacity(job.categories.len());
        for &category in &job.categories {
            let warmer = CategoryWarmer::new(
                category,
                self.reader.clone(),
                writer.clone(),
                ttl.clone(),
                job.batch_size,
                retry.clone(),
                Duration::from_secs(self.config.warming.category_timeout_secs),
                cancel.child_token(),
            );
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return CategoryStats::aborted(category),
                };
                warmer.run().await
            }));
        }

        let results = join_all(handles).await;
        let mut categories = Vec::with_capacity(results.len());
        for (result, &category) in results.into_iter().zip(job.categories.iter()) {
            match result {
                Ok(stats) => categories.push(stats),
                Err(e) => {
                    warn!("Warmer task for {} did not finish: {}", category, e);
                    categories.push(CategoryStats::aborted(category));
                }
            }
        }

        // 最后一个预热器结束后恰好采样一次
        let (telemetry, telemetry_ok) = match self.sample_telemetry().await {
            Ok(telemetry) => (telemetry, true),
            Err(e) => {
                warn!("Cache telemetry sample failed: {}", e);
                (CacheTelemetry::default(), false)
            }
        };

        let total_succeeded: u64 = categories.iter().map(|s| s.succeeded).sum();
        job.status = if cancel.is_cancelled() {
            JobStatus::Aborted
        } else if !telemetry_ok {
            JobStatus::Failed
        } else if total_succeeded == 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };

        let report = WarmingReport {
            job_id: job.job_id,
            started_at: job.started_at,
            finished_at: Utc::now(),
            status: job.status,
            categories,
            telemetry,
        };

        info!(
            "Warming job {} finished: status={}, total_succeeded={}, total_keys={}",
            job.job_id, job.status, total_succeeded, report.telemetry.total_keys
        );
        Ok(report)
    }

    async fn sample_telemetry(&self) -> Result<CacheTelemetry> {
        let total_keys = self.store.key_count().await?;
        let memory = self.store.memory_info().await?;
        Ok(CacheTelemetry {
            total_keys,
            memory_used_bytes: memory.used_bytes,
            fragmentation_ratio: memory.fragmentation_ratio,
        })
    }
}
