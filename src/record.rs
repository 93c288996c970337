//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了数据类别、缓存记录以及行到记录的转换逻辑。

use crate::error::{Result, WarmError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// 合法缓存键模式：小写字母、数字与分隔符，首字符必须为字母或数字
    pub static ref KEY_PATTERN: Regex =
        Regex::new(r"^[a-z0-9][a-z0-9:._-]*$").expect("key pattern is valid");
}

/// 数据类别枚举
///
/// 缓存数据的逻辑分区，每个类别拥有独立的TTL策略和预热流程
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// 商品目录
    Catalog,
    /// 用户画像与会话状态
    UserState,
    /// 派生聚合数据
    Aggregates,
    /// 查询结果缓存
    QueryResults,
    /// 参考查找数据
    Reference,
}

impl Category {
    /// 全部类别，按默认预热顺序排列
    pub const ALL: [Category; 5] = [
        Category::Catalog,
        Category::UserState,
        Category::Aggregates,
        Category::QueryResults,
        Category::Reference,
    ];

    /// 类别的稳定字符串标识，同时作为键命名空间
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Catalog => "catalog",
            Category::UserState => "user_state",
            Category::Aggregates => "aggregates",
            Category::QueryResults => "query_results",
            Category::Reference => "reference",
        }
    }

    /// 从字符串解析类别
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "catalog" => Ok(Category::Catalog),
            "user_state" => Ok(Category::UserState),
            "aggregates" => Ok(Category::Aggregates),
            "query_results" => Ok(Category::QueryResults),
            "reference" => Ok(Category::Reference),
            other => Err(WarmError::ConfigError(format!(
                "Unknown category '{}'. Expected one of: catalog, user_state, aggregates, query_results, reference",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 数据源原始行
///
/// Source Reader不做任何校验，缺失字段以None向下传递，
/// 由Transformer边界统一判定是否为畸形行
#[derive(Debug, Clone, Default)]
pub struct SourceRow {
    /// 源主键，作为缓存键的确定性来源
    pub id: Option<String>,
    /// 原始负载（JSON文本）
    pub payload: Option<String>,
    /// 热度信号（访问次数、评分等），缺失视为冷数据
    pub popularity: Option<f64>,
}

/// 转换中间产物
///
/// 已通过校验但尚未计算TTL的记录草稿
#[derive(Debug, Clone)]
pub struct TransformedRow {
    pub source_id: String,
    pub value: Vec<u8>,
    pub popularity: f64,
}

/// 规范化缓存记录
///
/// 键由类别与源标识确定性派生，重复预热总是产生相同的键集合
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub key: String,
    pub value: Vec<u8>,
    pub category: Category,
    pub ttl_seconds: u64,
    pub popularity_score: f64,
}

impl CacheRecord {
    /// 由转换草稿与已计算的TTL组装记录
    pub fn assemble(category: Category, row: TransformedRow, ttl_seconds: u64) -> Self {
        Self {
            key: cache_key(category, &row.source_id),
            value: row.value,
            category,
            ttl_seconds,
            popularity_score: row.popularity,
        }
    }
}

/// 派生确定性缓存键
///
/// 同一源行总是得到同一个键，保证重复预热幂等
pub fn cache_key(category: Category, source_id: &str) -> String {
    format!("warm:{}:{}", category.as_str(), source_id)
}

/// 行到记录的转换（Record Transformer）
///
/// 纯函数：相同输入总是产生相同输出。负载被解析一次以验证结构，
/// 再以规范形式重新序列化，此后预热系统不再解释其内容。
pub fn transform(row: &SourceRow, category: Category) -> Result<TransformedRow> {
    let source_id = row
        .id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WarmError::MalformedRow(format!("{}: missing source id", category)))?;

    let raw = row.payload.as_deref().ok_or_else(|| {
        WarmError::MalformedRow(format!("{}: row '{}' has no payload", category, source_id))
    })?;

    let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        WarmError::MalformedRow(format!(
            "{}: row '{}' payload is not valid JSON: {}",
            category, source_id, e
        ))
    })?;

    if parsed.is_null() {
        return Err(WarmError::MalformedRow(format!(
            "{}: row '{}' payload is null",
            category, source_id
        )));
    }

    let value = serde_json::to_vec(&parsed)
        .map_err(|e| WarmError::Serialization(e.to_string()))?;

    Ok(TransformedRow {
        source_id: source_id.to_string(),
        value,
        popularity: row.popularity.unwrap_or(0.0).max(0.0),
    })
}
