//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了审计库：预热报告与切流决定的不可变落库与查询。

use crate::error::{Result, WarmError};
use crate::report::{CutoverDecision, WarmingReport};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement,
    Value,
};
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// 审计库
///
/// 记录按jobId键入、只插入不更新，保留用于审计与趋势分析
/// （例如连续多次预热之间的内存增长）。存储为SQLite。
pub struct AuditStore {
    db: DatabaseConnection,
}

impl std::fmt::Debug for AuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditStore").finish()
    }
}

impl AuditStore {
    /// 打开（必要时建表）审计库
    #[instrument(level = "info")]
    pub async fn open(database_url: &str) -> Result<Self> {
        let mut options = ConnectOptions::new(database_url);
        options
            .max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(30));

        let db = Database::connect(options)
            .await
            .map_err(|e| WarmError::AuditError(e.to_string()))?;

        let create_reports = r#"
            CREATE TABLE IF NOT EXISTS warming_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                status TEXT NOT NULL,
                body TEXT NOT NULL
            )
        "#;
        let create_decisions = r#"
            CREATE TABLE IF NOT EXISTS cutover_decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                decided_at TEXT NOT NULL,
                passed INTEGER NOT NULL,
                body TEXT NOT NULL
            )
        "#;

        for sql in [create_reports, create_decisions] {
            db.execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                sql.to_string(),
            ))
            .await
            .map_err(|e| WarmError::AuditError(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// 落库一份预热报告
    pub async fn save_report(&self, report: &WarmingReport) -> Result<()> {
        let body = serde_json::to_string(report)
            .map_err(|e| WarmError::Serialization(e.to_string()))?;

        let insert_sql = r#"
            INSERT INTO warming_reports (job_id, finished_at, status, body)
            VALUES (?1, ?2, ?3, ?4)
        "#;

        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                insert_sql.to_string(),
                vec![
                    Value::String(Some(Box::new(report.job_id.to_string()))),
                    Value::String(Some(Box::new(report.finished_at.to_rfc3339()))),
                    Value::String(Some(Box::new(report.status.to_string()))),
                    Value::String(Some(Box::new(body))),
                ],
            ))
            .await
            .map_err(|e| WarmError::AuditError(e.to_string()))?;
        Ok(())
    }

    /// 落库一份切流决定
    pub async fn save_decision(&self, decision: &CutoverDecision) -> Result<()> {
        let body = serde_json::to_string(decision)
            .map_err(|e| WarmError::Serialization(e.to_string()))?;

        let insert_sql = r#"
            INSERT INTO cutover_decisions (job_id, decided_at, passed, body)
            VALUES (?1, ?2, ?3, ?4)
        "#;

        self.db
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                insert_sql.to_string(),
                vec![
                    Value::String(Some(Box::new(decision.job_id.to_string()))),
                    Value::String(Some(Box::new(decision.decided_at.to_rfc3339()))),
                    Value::Bool(Some(decision.passed)),
                    Value::String(Some(Box::new(body))),
                ],
            ))
            .await
            .map_err(|e| WarmError::AuditError(e.to_string()))?;
        Ok(())
    }

    async fn fetch_body(&self, sql: String, values: Vec<Value>) -> Result<Option<String>> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                sql,
                values,
            ))
            .await
            .map_err(|e| WarmError::AuditError(e.to_string()))?;

        match row {
            Some(row) => {
                let body: String = row
                    .try_get("", "body")
                    .map_err(|e| WarmError::AuditError(e.to_string()))?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }

    /// 最近一份预热报告
    pub async fn latest_report(&self) -> Result<Option<WarmingReport>> {
        let body = self
            .fetch_body(
                "SELECT body FROM warming_reports ORDER BY id DESC LIMIT 1".to_string(),
                vec![],
            )
            .await?;
        decode(body)
    }

    /// 指定任务的预热报告
    pub async fn report_for(&self, job_id: Uuid) -> Result<Option<WarmingReport>> {
        let body = self
            .fetch_body(
                "SELECT body FROM warming_reports WHERE job_id = ?1 ORDER BY id DESC LIMIT 1"
                    .to_string(),
                vec![Value::String(Some(Box::new(job_id.to_string())))],
            )
            .await?;
        decode(body)
    }

    /// 最近一份切流决定
    pub async fn latest_decision(&self) -> Result<Option<CutoverDecision>> {
        let body = self
            .fetch_body(
                "SELECT body FROM cutover_decisions ORDER BY id DESC LIMIT 1".to_string(),
                vec![],
            )
            .await?;
        decode(body)
    }

    /// 指定任务的切流决定
    pub async fn decision_for(&self, job_id: Uuid) -> Result<Option<CutoverDecision>> {
        let body = self
            .fetch_body(
                "SELECT body FROM cutover_decisions WHERE job_id = ?1 ORDER BY id DESC LIMIT 1"
                    .to_string(),
                vec![Value::String(Some(Box::new(job_id.to_string())))],
            )
            .await?;
        decode(body)
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Option<String>) -> Result<Option<T>> {
    match body {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| WarmError::Serialization(e.to_string())),
        None => Ok(None),
    }
}
