//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和内存版模拟实现。

use async_trait::async_trait;
use oxwarm::config::Config;
use oxwarm::cutover::{Provisioner, TrafficRouter};
use oxwarm::error::{Result, WarmError};
use oxwarm::record::{Category, SourceRow};
use oxwarm::source::{RowBatch, SourceReader};
use oxwarm::store::{CacheStore, MemoryInfo};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

#[allow(dead_code)]
static INIT: Once = Once::new();

#[allow(dead_code)]
pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 生成重试延迟极小的测试配置
#[allow(dead_code)]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.warming.batch_size = 50;
    config.warming.max_retries = 2;
    config.warming.retry_base_delay_ms = 1;
    config.warming.category_timeout_secs = 30;
    config
}

/// 生成n行合法的JSON源数据，热度随行号递增
#[allow(dead_code)]
pub fn json_rows(prefix: &str, n: usize) -> Vec<SourceRow> {
    (0..n)
        .map(|i| SourceRow {
            id: Some(format!("{}-{:04}", prefix, i)),
            payload: Some(format!(r#"{{"name":"{} {}","rank":{}}}"#, prefix, i, i)),
            popularity: Some(i as f64),
        })
        .collect()
}

/// 生成n行负载无法解析的畸形数据
#[allow(dead_code)]
pub fn malformed_rows(prefix: &str, n: usize) -> Vec<SourceRow> {
    (0..n)
        .map(|i| SourceRow {
            id: Some(format!("{}-{:04}", prefix, i)),
            payload: Some("{broken".to_string()),
            popularity: None,
        })
        .collect()
}

/// 内存版数据源
///
/// 可配置某类别从指定偏移起持续失败，以及每次读取的人为延迟
#[derive(Default)]
pub struct MockSourceReader {
    rows: HashMap<Category, Vec<SourceRow>>,
    fail_from: HashMap<Category, u64>,
    read_delay: Option<Duration>,
    pub reads: AtomicU32,
}

#[allow(dead_code)]
impl MockSourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, category: Category, rows: Vec<SourceRow>) -> Self {
        self.rows.insert(category, rows);
        self
    }

    pub fn failing_from(mut self, category: Category, offset: u64) -> Self {
        self.fail_from.insert(category, offset);
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }
}

#[async_trait]
impl SourceReader for MockSourceReader {
    async fn read(&self, category: Category, offset: u64, limit: u64) -> Result<RowBatch> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(&fail_offset) = self.fail_from.get(&category) {
            if offset >= fail_offset {
                return Err(WarmError::SourceUnavailable(format!(
                    "{} unreachable at offset {}",
                    category, offset
                )));
            }
        }
        let rows = self.rows.get(&category).cloned().unwrap_or_default();
        let start = offset.min(rows.len() as u64) as usize;
        let end = offset
            .saturating_add(limit)
            .min(rows.len() as u64) as usize;
        Ok(RowBatch {
            rows: rows[start..end].to_vec(),
        })
    }
}

/// 内存版缓存存储
///
/// 记录每个键的值与TTL；可注入瞬时写入失败、整库不可达与值损坏
#[derive(Default)]
pub struct MockCacheStore {
    pub data: Mutex<HashMap<String, (Vec<u8>, u64)>>,
    pub transient_failures: AtomicU32,
    pub unavailable: AtomicBool,
    corrupt: Mutex<HashSet<String>>,
}

#[allow(dead_code)]
impl MockCacheStore {
    /// 令此后前n次写入返回瞬时错误
    pub fn fail_next_writes(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// 令指定键读取到无法反序列化的值
    pub fn corrupt_key(&self, key: &str) {
        self.corrupt.lock().unwrap().insert(key.to_string());
    }

    /// 损坏当前全部键
    pub fn corrupt_all(&self) {
        let keys: Vec<String> = self.data.lock().unwrap().keys().cloned().collect();
        let mut corrupt = self.corrupt.lock().unwrap();
        corrupt.extend(keys);
    }

    /// 清空存储，模拟缓存被冲刷
    pub fn flush(&self) {
        self.data.lock().unwrap().clear();
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.data.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }
}

#[async_trait]
impl CacheStore for MockCacheStore {
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(WarmError::CacheTransient("store is down".to_string()));
        }
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(WarmError::CacheTransient("connection reset".to_string()));
        }
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_vec(), ttl_seconds));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.corrupt.lock().unwrap().contains(key) {
            return Ok(Some(vec![0xff, 0xfe, b'{']));
        }
        Ok(self.data.lock().unwrap().get(key).map(|(v, _)| v.clone()))
    }

    async fn key_count(&self) -> Result<u64> {
        Ok(self.data.lock().unwrap().len() as u64)
    }

    async fn memory_info(&self) -> Result<MemoryInfo> {
        let used: usize = self
            .data
            .lock()
            .unwrap()
            .values()
            .map(|(v, _)| v.len())
            .sum();
        Ok(MemoryInfo {
            used_bytes: used as u64,
            fragmentation_ratio: 1.05,
        })
    }

    async fn ping(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(WarmError::StoreUnavailable("store is down".to_string()));
        }
        Ok(())
    }
}

/// 记录调用的基础设施提供者
#[derive(Default)]
pub struct MockProvisioner {
    pub deployed: Mutex<Vec<String>>,
    pub torn_down: Mutex<Vec<String>>,
    pub fail_deploy: AtomicBool,
    counter: AtomicU32,
}

#[allow(dead_code)]
impl MockProvisioner {
    pub fn deployed_envs(&self) -> Vec<String> {
        self.deployed.lock().unwrap().clone()
    }

    pub fn torn_down_envs(&self) -> Vec<String> {
        self.torn_down.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn deploy_environment(&self) -> Result<String> {
        if self.fail_deploy.load(Ordering::SeqCst) {
            return Err(WarmError::ProvisioningFailed(
                "quota exceeded".to_string(),
            ));
        }
        let env_id = format!("env-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.deployed.lock().unwrap().push(env_id.clone());
        Ok(env_id)
    }

    async fn teardown_environment(&self, env_id: &str) -> Result<()> {
        self.torn_down.lock().unwrap().push(env_id.to_string());
        Ok(())
    }
}

/// 记录调用的流量路由
#[derive(Default)]
pub struct MockRouter {
    pub switches: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

#[allow(dead_code)]
impl MockRouter {
    pub fn recorded_switches(&self) -> Vec<(String, String)> {
        self.switches.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrafficRouter for MockRouter {
    async fn switch_traffic(&self, from: &str, to: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(WarmError::RoutingFailed("router rejected update".to_string()));
        }
        self.switches
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string()));
        Ok(())
    }
}
