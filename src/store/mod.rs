//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了分布式缓存存储的访问接口。

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod redis_store;

pub use redis_store::RedisStore;

/// 缓存内存占用信息
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MemoryInfo {
    /// 已用内存（字节）
    pub used_bytes: u64,
    /// 内存碎片率
    pub fragmentation_ratio: f64,
}

/// 缓存存储trait
///
/// 四个操作构成稳定的线缆契约，任何实现了它们的键值存储都可替换接入：
/// 带过期写入、读取、键计数、内存/碎片自省。另有ping用于整库可达性探测。
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 带过期时间写入，重写同键总是安全的（last-write-wins）
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()>;

    /// 读取键值，未命中返回None
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 当前键总数
    async fn key_count(&self) -> Result<u64>;

    /// 内存占用与碎片率
    async fn memory_info(&self) -> Result<MemoryInfo>;

    /// 可达性探测
    async fn ping(&self) -> Result<()>;
}
