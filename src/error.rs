//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了预热与切流系统的错误类型和处理机制。

use thiserror::Error;

/// 预热系统错误类型枚举
///
/// 区分可本地恢复的错误（按行/按类别计数）与对整个任务致命的错误
#[derive(Error, Debug)]
pub enum WarmError {
    /// 数据源不可达（连接失败），由Category Warmer重试后中止该类别
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// 数据源查询超时
    #[error("Query timed out: {0}")]
    QueryTimeout(String),

    /// 行数据格式错误，跳过并计入失败，不会中止批次
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// 缓存写入瞬时错误（连接重置、超时），带退避重试
    #[error("Transient cache error: {0}")]
    CacheTransient(String),

    /// 缓存写入永久错误（键非法、值过大），不重试
    #[error("Permanent cache error: {0}")]
    CachePermanent(String),

    /// 缓存存储整体不可达，对整个预热任务致命
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    /// 校验未通过，触发回滚
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// 环境部署失败，切流尝试终止
    #[error("Provisioning failed: {0}")]
    ProvisioningFailed(String),

    /// 流量切换失败，切流尝试终止
    #[error("Traffic routing failed: {0}")]
    RoutingFailed(String),

    /// 新任务与进行中任务的类别集合重叠
    #[error("Job conflict: {0}")]
    JobConflict(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 审计库操作失败
    #[error("Audit store error: {0}")]
    AuditError(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Sea-ORM数据库错误
    #[error("Sea-ORM error: {0}")]
    SeaOrmError(#[from] sea_orm::DbErr),

    /// Redis错误
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// 预热操作结果类型别名
///
/// 简化错误处理，所有预热操作都返回此类型
pub type Result<T> = std::result::Result<T, WarmError>;
