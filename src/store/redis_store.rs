//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的缓存存储实现。

use crate::config::CacheConfig;
use crate::error::{Result, WarmError};
use crate::store::{CacheStore, MemoryInfo};
use async_trait::async_trait;
use lazy_static::lazy_static;
use redis::{aio::ConnectionManager, Client};
use regex::Regex;
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, instrument};

lazy_static! {
    static ref USED_MEMORY_PATTERN: Regex =
        Regex::new(r"used_memory:(\d+)").expect("used_memory pattern is valid");
    static ref FRAGMENTATION_PATTERN: Regex =
        Regex::new(r"mem_fragmentation_ratio:([\d.]+)").expect("fragmentation pattern is valid");
}

/// Redis缓存存储
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    command_timeout_ms: u64,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("command_timeout_ms", &self.command_timeout_ms)
            .finish()
    }
}

/// 按错误性质分类Redis错误
///
/// 连接类与超时归为瞬时错误，交由写入器退避重试；其余视为永久错误
fn classify_redis_error(e: redis::RedisError) -> WarmError {
    if e.is_timeout() || e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        WarmError::CacheTransient(e.to_string())
    } else {
        WarmError::CachePermanent(e.to_string())
    }
}

impl RedisStore {
    /// 建立Redis连接
    #[instrument(skip(config), level = "info", name = "init_redis_store")]
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let connection_string_secret = &config.connection_string;
        let connection_string = if config.enable_tls
            && !connection_string_secret
                .expose_secret()
                .starts_with("rediss://")
        {
            connection_string_secret
                .expose_secret()
                .replace("redis://", "rediss://")
        } else {
            connection_string_secret.expose_secret().to_string()
        };

        let client = Client::open(connection_string.as_str())?;
        let manager = match tokio::time::timeout(
            Duration::from_millis(config.connection_timeout_ms),
            client.get_connection_manager(),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => {
                return Err(WarmError::StoreUnavailable(format!(
                    "Connection timed out after {}ms",
                    config.connection_timeout_ms
                )));
            }
        };

        Ok(Self {
            manager,
            command_timeout_ms: config.command_timeout_ms,
        })
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = redis::RedisResult<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(Duration::from_millis(self.command_timeout_ms), fut).await {
            Ok(res) => res.map_err(classify_redis_error),
            Err(_) => Err(WarmError::CacheTransient(format!(
                "{} timed out after {}ms",
                operation, self.command_timeout_ms
            ))),
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = self
            .with_timeout("SET", async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EX")
                    .arg(ttl_seconds)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        self.with_timeout("GET", async move {
            redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await
    }

    async fn key_count(&self) -> Result<u64> {
        let mut conn = self.manager.clone();
        self.with_timeout("DBSIZE", async move {
            redis::cmd("DBSIZE").query_async(&mut conn).await
        })
        .await
    }

    async fn memory_info(&self) -> Result<MemoryInfo> {
        let mut conn = self.manager.clone();
        let info: String = self
            .with_timeout("INFO", async move {
                redis::cmd("INFO")
                    .arg("memory")
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        let used_bytes = USED_MEMORY_PATTERN
            .captures(&info)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0);
        let fragmentation_ratio = FRAGMENTATION_PATTERN
            .captures(&info)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0);

        debug!(
            "Cache memory sample: used_bytes={}, fragmentation_ratio={}",
            used_bytes, fragmentation_ratio
        );

        Ok(MemoryInfo {
            used_bytes,
            fragmentation_ratio,
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let pong: String = self
            .with_timeout("PING", async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await
            .map_err(|e| WarmError::StoreUnavailable(e.to_string()))?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(WarmError::StoreUnavailable(format!(
                "Unexpected PING reply: {}",
                pong
            )))
        }
    }
}
