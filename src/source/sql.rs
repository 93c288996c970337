//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Sea-ORM的数据源读取器实现。

use crate::config::SourceConfig;
use crate::error::{Result, WarmError};
use crate::record::{Category, SourceRow};
use crate::source::{RowBatch, SourceReader};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, instrument};

/// 类别到源表的映射
///
/// id列同时是排序键，保证分页确定性
struct CategoryTable {
    table: &'static str,
    id_col: &'static str,
    payload_col: &'static str,
    popularity_col: &'static str,
}

fn table_for(category: Category) -> CategoryTable {
    match category {
        Category::Catalog => CategoryTable {
            table: "catalog_items",
            id_col: "id",
            payload_col: "payload",
            popularity_col: "view_count",
        },
        Category::UserState => CategoryTable {
            table: "user_profiles",
            id_col: "user_id",
            payload_col: "profile",
            popularity_col: "visit_count",
        },
        Category::Aggregates => CategoryTable {
            table: "derived_aggregates",
            id_col: "agg_key",
            payload_col: "body",
            popularity_col: "hit_count",
        },
        Category::QueryResults => CategoryTable {
            table: "query_results",
            id_col: "query_hash",
            payload_col: "result",
            popularity_col: "hit_count",
        },
        Category::Reference => CategoryTable {
            table: "reference_data",
            id_col: "ref_key",
            payload_col: "body",
            popularity_col: "lookup_count",
        },
    }
}

/// 基于Sea-ORM的数据源读取器
///
/// 对源库只发只读查询；超时与连接故障交由Category Warmer重试
pub struct SqlSourceReader {
    db: DatabaseConnection,
    query_timeout_ms: u64,
}

impl std::fmt::Debug for SqlSourceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlSourceReader")
            .field("query_timeout_ms", &self.query_timeout_ms)
            .finish()
    }
}

impl SqlSourceReader {
    /// 建立数据源连接
    #[instrument(skip(config), level = "info")]
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let mut options = ConnectOptions::new(config.connection_string.expose_secret());
        options
            .max_connections(config.max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_millis(config.query_timeout_ms));

        let db = Database::connect(options)
            .await
            .map_err(|e| WarmError::SourceUnavailable(e.to_string()))?;

        Ok(Self {
            db,
            query_timeout_ms: config.query_timeout_ms,
        })
    }

    /// 包装既有连接，测试用
    pub fn from_connection(db: DatabaseConnection, query_timeout_ms: u64) -> Self {
        Self {
            db,
            query_timeout_ms,
        }
    }
}

#[async_trait]
impl SourceReader for SqlSourceReader {
    #[instrument(skip(self), level = "debug")]
    async fn read(&self, category: Category, offset: u64, limit: u64) -> Result<RowBatch> {
        let mapping = table_for(category);

        // LIMIT/OFFSET为无符号整数，直接内联以保持各后端占位符兼容
        let sql = format!(
            "SELECT {id}, {payload}, {popularity} FROM {table} ORDER BY {id} LIMIT {limit} OFFSET {offset}",
            id = mapping.id_col,
            payload = mapping.payload_col,
            popularity = mapping.popularity_col,
            table = mapping.table,
            limit = limit,
            offset = offset,
        );

        let statement = Statement::from_string(self.db.get_database_backend(), sql);

        let query_rows = match tokio::time::timeout(
            Duration::from_millis(self.query_timeout_ms),
            self.db.query_all(statement),
        )
        .await
        {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                return Err(WarmError::SourceUnavailable(format!(
                    "{} page at offset {}: {}",
                    category, offset, e
                )));
            }
            Err(_) => {
                return Err(WarmError::QueryTimeout(format!(
                    "{} page at offset {} exceeded {}ms",
                    category, offset, self.query_timeout_ms
                )));
            }
        };

        debug!(
            "Fetched {} rows for category {} at offset {}",
            query_rows.len(),
            category,
            offset
        );

        let rows = query_rows
            .iter()
            .map(|row| SourceRow {
                id: row.try_get::<String>("", mapping.id_col).ok(),
                payload: row.try_get::<String>("", mapping.payload_col).ok(),
                popularity: row
                    .try_get::<f64>("", mapping.popularity_col)
                    .ok()
                    .or_else(|| {
                        row.try_get::<i64>("", mapping.popularity_col)
                            .ok()
                            .map(|v| v as f64)
                    }),
            })
            .collect();

        Ok(RowBatch { rows })
    }
}
