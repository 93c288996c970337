//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存写入器：校验、退避重试与至少一次写入语义。

use crate::config::CacheConfig;
use crate::error::{Result, WarmError};
use crate::record::{CacheRecord, KEY_PATTERN};
use crate::retry::{retry_with_backoff, ErrorClass, RetryPolicy};
use crate::store::CacheStore;
use std::sync::Arc;

/// 缓存写入器
///
/// 写入是幂等的：记录是派生数据而非权威数据，同键重写总是安全。
/// 瞬时错误按退避策略重试；永久错误与重试耗尽都返回给调用方计数，
/// 不会中断批次。
#[derive(Clone)]
pub struct CacheWriter {
    store: Arc<dyn CacheStore>,
    retry: RetryPolicy,
    max_key_length: usize,
    max_value_size: usize,
}

impl std::fmt::Debug for CacheWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWriter")
            .field("retry", &self.retry)
            .field("max_key_length", &self.max_key_length)
            .field("max_value_size", &self.max_value_size)
            .finish()
    }
}

fn classify_write_error(e: &WarmError) -> ErrorClass {
    match e {
        WarmError::CacheTransient(_) => ErrorClass::Retryable,
        _ => ErrorClass::Fatal,
    }
}

impl CacheWriter {
    pub fn new(store: Arc<dyn CacheStore>, retry: RetryPolicy, cache: &CacheConfig) -> Self {
        Self {
            store,
            retry,
            max_key_length: cache.max_key_length,
            max_value_size: cache.max_value_size,
        }
    }

    /// 写入前的本地校验，失败即为永久错误
    fn validate_record(&self, record: &CacheRecord) -> Result<()> {
        if record.key.len() > self.max_key_length {
            return Err(WarmError::CachePermanent(format!(
                "Key of length {} exceeds maximum {}",
                record.key.len(),
                self.max_key_length
            )));
        }
        if !KEY_PATTERN.is_match(&record.key) {
            return Err(WarmError::CachePermanent(format!(
                "Key '{}' contains illegal characters",
                record.key
            )));
        }
        if record.value.len() > self.max_value_size {
            return Err(WarmError::CachePermanent(format!(
                "Value for '{}' is {} bytes, exceeds maximum {}",
                record.key,
                record.value.len(),
                self.max_value_size
            )));
        }
        if record.ttl_seconds == 0 {
            return Err(WarmError::CachePermanent(format!(
                "Record '{}' has zero TTL",
                record.key
            )));
        }
        Ok(())
    }

    /// 写入单条记录
    pub async fn write(&self, record: &CacheRecord) -> Result<()> {
        self.validate_record(record)?;
        retry_with_backoff(&self.retry, classify_write_error, || {
            self.store
                .set_with_expiry(&record.key, &record.value, record.ttl_seconds)
        })
        .await
    }
}
