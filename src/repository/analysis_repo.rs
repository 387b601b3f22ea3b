// ==========================================
// 供应商 WIP 跟踪系统 - 日装片分析仓储
// ==========================================
// 表: daily_analysis（analysis_date 主键，按日追加）
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{DailyAnalysisRow, PackageBucketCount};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct DailyAnalysisRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DailyAnalysisRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 最新分析日期（空表返回 None）
    pub fn last_date(&self) -> RepositoryResult<Option<NaiveDate>> {
        let conn = self.get_conn()?;
        let date: Option<NaiveDate> =
            conn.query_row("SELECT MAX(analysis_date) FROM daily_analysis", [], |row| {
                row.get(0)
            })?;
        Ok(date)
    }

    /// 单事务批量插入；任一行失败则整批回滚
    pub fn insert_batch(
        &self,
        rows: &[DailyAnalysisRow],
        now: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO daily_analysis (analysis_date, supplier, buckets_json, total, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for row in rows {
                stmt.execute(params![
                    row.analysis_date,
                    row.supplier,
                    serde_json::to_string(&row.buckets)?,
                    row.total(),
                    now,
                ])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        info!(count = rows.len(), "日装片分析批量写入完成");
        Ok(rows.len())
    }

    pub fn list_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<DailyAnalysisRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT analysis_date, supplier, buckets_json
            FROM daily_analysis
            WHERE analysis_date BETWEEN ?1 AND ?2
            ORDER BY analysis_date
            "#,
        )?;
        let rows = stmt.query_map(params![from, to], |row| {
            let buckets_json: String = row.get(2)?;
            let buckets: Vec<PackageBucketCount> = serde_json::from_str(&buckets_json)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
            Ok(DailyAnalysisRow {
                analysis_date: row.get(0)?,
                supplier: row.get(1)?,
                buckets,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
