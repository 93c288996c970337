//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了预热与切流系统的配置结构和解析逻辑。

use crate::record::Category;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// 顶层配置
///
/// 所有段都有默认值，缺省时得到一个可在本机运行的配置
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 预热任务配置
    pub warming: WarmingConfig,
    /// 按类别的TTL策略参数
    #[serde(default = "default_ttl_bands")]
    pub ttl: HashMap<Category, CategoryTtlConfig>,
    /// 切流校验阈值
    pub thresholds: ThresholdConfig,
    /// 关系型数据源配置
    pub source: SourceConfig,
    /// 缓存存储配置
    pub cache: CacheConfig,
    /// 审计库配置
    pub audit: AuditConfig,
    /// 切流控制配置
    pub cutover: CutoverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warming: WarmingConfig::default(),
            ttl: default_ttl_bands(),
            thresholds: ThresholdConfig::default(),
            source: SourceConfig::default(),
            cache: CacheConfig::default(),
            audit: AuditConfig::default(),
            cutover: CutoverConfig::default(),
        }
    }
}

/// 预热任务配置
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WarmingConfig {
    /// 每页读取的行数
    pub batch_size: u64,
    /// 单次操作的最大重试次数
    pub max_retries: u32,
    /// 退避基准延迟（毫秒），按 2^n 递增
    pub retry_base_delay_ms: u64,
    /// 并发预热的类别上限，约束源库连接占用
    pub max_parallelism: usize,
    /// 单类别整体超时（秒），超时的类别按Aborted处理
    pub category_timeout_secs: u64,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_retries: 3,
            retry_base_delay_ms: 200,
            max_parallelism: 4,
            category_timeout_secs: 600,
        }
    }
}

/// 单类别TTL参数
///
/// `ttl = base + bonus × popularity`，夹紧到 `[base, max]`
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CategoryTtlConfig {
    /// 基础TTL（秒）
    pub base_ttl_secs: u64,
    /// 每单位热度信号的TTL加成（秒）
    pub popularity_bonus_secs: u64,
    /// TTL上限（秒）
    pub max_ttl_secs: u64,
}

impl Default for CategoryTtlConfig {
    fn default() -> Self {
        Self {
            base_ttl_secs: 300,
            popularity_bonus_secs: 60,
            max_ttl_secs: 3600,
        }
    }
}

fn default_ttl_bands() -> HashMap<Category, CategoryTtlConfig> {
    let mut bands = HashMap::new();
    bands.insert(
        Category::Catalog,
        CategoryTtlConfig {
            base_ttl_secs: 600,
            popularity_bonus_secs: 120,
            max_ttl_secs: 14400,
        },
    );
    bands.insert(
        Category::UserState,
        CategoryTtlConfig {
            base_ttl_secs: 300,
            popularity_bonus_secs: 60,
            max_ttl_secs: 3600,
        },
    );
    bands.insert(
        Category::Aggregates,
        CategoryTtlConfig {
            base_ttl_secs: 900,
            popularity_bonus_secs: 180,
            max_ttl_secs: 21600,
        },
    );
    bands.insert(
        Category::QueryResults,
        CategoryTtlConfig {
            base_ttl_secs: 120,
            popularity_bonus_secs: 30,
            max_ttl_secs: 1800,
        },
    );
    bands.insert(
        Category::Reference,
        CategoryTtlConfig {
            base_ttl_secs: 3600,
            popularity_bonus_secs: 0,
            max_ttl_secs: 86400,
        },
    );
    bands
}

/// 切流校验阈值
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThresholdConfig {
    /// 预热后缓存键总数下限
    pub min_total_keys: u64,
    /// 各必需类别的成功写入数下限
    pub min_per_category: HashMap<Category, u64>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_total_keys: 1,
            min_per_category: HashMap::new(),
        }
    }
}

/// 关系型数据源配置
///
/// 预热系统对源库只读，不做任何写操作
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// 连接字符串（postgres/mysql/sqlite）
    pub connection_string: SecretString,
    /// 单次查询超时（毫秒）
    pub query_timeout_ms: u64,
    /// 连接池上限
    pub max_connections: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            connection_string: SecretString::new("sqlite::memory:".to_string().into()),
            query_timeout_ms: 5000,
            max_connections: 8,
        }
    }
}

/// 缓存存储配置
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接建立超时（毫秒）
    pub connection_timeout_ms: u64,
    /// 单命令超时（毫秒）
    pub command_timeout_ms: u64,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 键的最大长度
    pub max_key_length: usize,
    /// 值的最大大小（字节）
    pub max_value_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            connection_string: SecretString::new("redis://localhost:6379".to_string().into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            enable_tls: false,
            max_key_length: 256,
            max_value_size: 1024 * 1024 * 10, // 10MB
        }
    }
}

/// 审计库配置
///
/// WarmingReport与CutoverDecision以不可变记录形式落库
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuditConfig {
    /// SQLite数据库地址
    pub database_url: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://oxwarm_audit.db?mode=rwc".to_string(),
        }
    }
}

/// 切流控制配置
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CutoverConfig {
    /// 当前承载流量的环境标识
    pub active_environment: String,
    /// 部署命令，stdout最后一行输出新环境标识
    pub deploy_command: String,
    /// 环境销毁命令，`{env}` 占位符替换为环境标识
    pub teardown_command: String,
    /// 切流命令，`{from}`/`{to}` 占位符替换为环境标识
    pub switch_command: String,
    /// 切流成功后旧环境的保留宽限期（秒），等待在途请求完成
    pub grace_period_secs: u64,
}

impl Default for CutoverConfig {
    fn default() -> Self {
        Self {
            active_environment: "blue".to_string(),
            deploy_command: String::new(),
            teardown_command: String::new(),
            switch_command: String::new(),
            grace_period_secs: 30,
        }
    }
}

impl Config {
    /// 从TOML文件加载配置
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw).map_err(|e| {
            crate::error::WarmError::ConfigError(format!(
                "Failed to parse {}: {}",
                path.display(),
                e
            ))
        })?;
        config
            .validate()
            .map_err(crate::error::WarmError::ConfigError)?;
        Ok(config)
    }

    /// 加载指定配置文件，未指定时使用默认配置
    pub fn load_or_default(path: Option<&Path>) -> crate::error::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// 验证配置
    ///
    /// 检查所有字段的取值范围，返回第一个不合法的字段说明
    pub fn validate(&self) -> Result<(), String> {
        if self.warming.batch_size == 0 || self.warming.batch_size > 10_000 {
            return Err("warming.batch_size must be between 1 and 10000".to_string());
        }

        if self.warming.max_parallelism == 0 || self.warming.max_parallelism > 64 {
            return Err("warming.max_parallelism must be between 1 and 64".to_string());
        }

        if self.warming.max_retries > 10 {
            return Err("warming.max_retries cannot exceed 10".to_string());
        }

        if !(1..=10_000).contains(&self.warming.retry_base_delay_ms) {
            return Err("warming.retry_base_delay_ms must be between 1 and 10000 ms".to_string());
        }

        if !(1..=86_400).contains(&self.warming.category_timeout_secs) {
            return Err(
                "warming.category_timeout_secs must be between 1 and 86400 seconds".to_string(),
            );
        }

        for (category, band) in &self.ttl {
            if band.base_ttl_secs == 0 {
                return Err(format!("ttl.{} base_ttl_secs cannot be zero", category));
            }
            if band.max_ttl_secs < band.base_ttl_secs {
                return Err(format!(
                    "ttl.{} max_ttl_secs ({}) must be >= base_ttl_secs ({})",
                    category, band.max_ttl_secs, band.base_ttl_secs
                ));
            }
            if band.max_ttl_secs > 86_400 * 30 {
                return Err(format!(
                    "ttl.{} max_ttl_secs cannot exceed 30 days (2592000 seconds)",
                    category
                ));
            }
        }

        if !(100..=30_000).contains(&self.cache.connection_timeout_ms) {
            return Err("cache.connection_timeout_ms must be between 100 and 30000 ms".to_string());
        }

        if !(100..=60_000).contains(&self.cache.command_timeout_ms) {
            return Err("cache.command_timeout_ms must be between 100 and 60000 ms".to_string());
        }

        if !(16..=1024).contains(&self.cache.max_key_length) {
            return Err("cache.max_key_length must be between 16 and 1024".to_string());
        }

        if self.cache.max_value_size == 0 || self.cache.max_value_size > 1024 * 1024 * 64 {
            return Err("cache.max_value_size must be between 1 byte and 64MB".to_string());
        }

        if !(100..=60_000).contains(&self.source.query_timeout_ms) {
            return Err("source.query_timeout_ms must be between 100 and 60000 ms".to_string());
        }

        if self.source.max_connections == 0 || self.source.max_connections > 128 {
            return Err("source.max_connections must be between 1 and 128".to_string());
        }

        if self.audit.database_url.is_empty() {
            return Err("audit.database_url cannot be empty".to_string());
        }

        if self.cutover.grace_period_secs > 3600 {
            return Err("cutover.grace_period_secs cannot exceed 3600 seconds".to_string());
        }

        Ok(())
    }
}
