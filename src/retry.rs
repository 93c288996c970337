//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了统一的指数退避重试工具。

use crate::error::{Result, WarmError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// 错误分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 可重试（瞬时故障）
    Retryable,
    /// 不可重试，立即向上返回
    Fatal,
}

/// 重试策略
///
/// 第n次重试前等待 `base_delay_ms × 2^n` 毫秒（200ms、400ms、800ms…）
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    /// 第attempt次重试（从0计）前的退避时长
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// 带退避的重试执行器
///
/// Source Reader与Cache Writer统一经由此函数重试，
/// 分类器决定错误是否值得再次尝试
pub async fn retry_with_backoff<T, F, Fut, C>(
    policy: &RetryPolicy,
    classify: C,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&WarmError) -> ErrorClass,
{
    let mut last_error: Option<WarmError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt - 1);
            debug!("Retry attempt {} after {:?}", attempt, delay);
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if classify(&e) == ErrorClass::Fatal {
                    return Err(e);
                }
                debug!("Retryable failure on attempt {}: {}", attempt, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| WarmError::CacheTransient("retries exhausted".to_string())))
}
