// ==========================================
// 供应商 WIP 跟踪系统 - WIP 数据仓储
// ==========================================
// 表: wip_fab / wip_assy（当前视图）、wip_snapshot_history（快照历史）
// 红线: Repository 不含业务逻辑，插入/更新/完成的判定在对账引擎
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{CanonicalWipRecord, StageQuantities, WipCategory, WipStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const CURRENT_COLUMNS: &str = r#"
    supplier, lot_id, purchase_order, item_name, quantity, status,
    stage_quantities, layer_count, remain_layer, current_position, current_stage,
    forecast_date, next_day_forecast, three_day_forecast, seven_day_forecast,
    warehouse_stock, online_total, hold_info, snapshot_date, finished_at
"#;

/// 当前视图中已落库记录的对账相关状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredState {
    pub snapshot_date: NaiveDate,
    pub finished_at: Option<DateTime<Utc>>,
}

/// 快照历史条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub snapshot_date: NaiveDate,
    pub batch_id: String,
    pub status: String,
    pub current_stage: Option<String>,
    pub warehouse_stock: i64,
    pub online_total: i64,
}

/// WIP 汇总
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WipSummary {
    pub category: WipCategory,
    pub total_count: i64,
    pub in_progress_count: i64,
    pub completed_count: i64,
    /// 平均完成率（%），仅晶圆厂有层数
    pub avg_completion_rate: Option<f64>,
}

// ==========================================
// WipRepository
// ==========================================
pub struct WipRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WipRepository {
    /// 打开数据库并建表
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在单个事务中执行；闭包返回错误或 panic 时整体回滚
    pub fn with_transaction<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> RepositoryResult<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(value)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub fn find_state(
        conn: &Connection,
        category: WipCategory,
        supplier: &str,
        lot_id: &str,
    ) -> RepositoryResult<Option<StoredState>> {
        let sql = format!(
            "SELECT snapshot_date, finished_at FROM {} WHERE supplier = ?1 AND lot_id = ?2",
            category.current_table()
        );
        let state = conn
            .query_row(&sql, params![supplier, lot_id], |row| {
                Ok(StoredState {
                    snapshot_date: row.get(0)?,
                    finished_at: row.get(1)?,
                })
            })
            .optional()?;
        Ok(state)
    }

    pub fn insert_current(
        conn: &Connection,
        record: &CanonicalWipRecord,
        finished_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let sql = format!(
            r#"
            INSERT INTO {} ({}, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19, ?20, ?21, ?21)
            "#,
            record.category.current_table(),
            CURRENT_COLUMNS
        );
        conn.execute(
            &sql,
            params![
                record.supplier,
                record.lot_id,
                record.purchase_order,
                record.item_name,
                record.quantity,
                record.status.as_str(),
                record.stage_quantities.to_json()?,
                record.layer_count,
                record.remain_layer,
                record.current_position,
                record.current_stage,
                record.forecast_date,
                record.next_day_forecast,
                record.three_day_forecast,
                record.seven_day_forecast,
                record.warehouse_stock,
                record.online_total,
                record.hold_info,
                record.snapshot_date,
                finished_at,
                now,
            ],
        )?;
        Ok(())
    }

    /// 覆盖可变字段；finished_at 只写一次
    pub fn update_current(
        conn: &Connection,
        record: &CanonicalWipRecord,
        finished_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let sql = format!(
            r#"
            UPDATE {} SET
                purchase_order = ?3, item_name = ?4, quantity = ?5, status = ?6,
                stage_quantities = ?7, layer_count = ?8, remain_layer = ?9,
                current_position = ?10, current_stage = ?11, forecast_date = ?12,
                next_day_forecast = ?13, three_day_forecast = ?14, seven_day_forecast = ?15,
                warehouse_stock = ?16, online_total = ?17, hold_info = ?18,
                snapshot_date = ?19, finished_at = COALESCE(finished_at, ?20),
                updated_at = ?21
            WHERE supplier = ?1 AND lot_id = ?2
            "#,
            record.category.current_table()
        );
        let affected = conn.execute(
            &sql,
            params![
                record.supplier,
                record.lot_id,
                record.purchase_order,
                record.item_name,
                record.quantity,
                record.status.as_str(),
                record.stage_quantities.to_json()?,
                record.layer_count,
                record.remain_layer,
                record.current_position,
                record.current_stage,
                record.forecast_date,
                record.next_day_forecast,
                record.three_day_forecast,
                record.seven_day_forecast,
                record.warehouse_stock,
                record.online_total,
                record.hold_info,
                record.snapshot_date,
                finished_at,
                now,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: record.category.current_table().to_string(),
                id: format!("{}/{}", record.supplier, record.lot_id),
            });
        }
        Ok(())
    }

    /// 同一 (类别, 供应商, lot, 快照日期) 重复写入时覆盖
    pub fn upsert_history(
        conn: &Connection,
        record: &CanonicalWipRecord,
        batch_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO wip_snapshot_history (
                category, supplier, lot_id, snapshot_date, batch_id, status, current_stage,
                stage_quantities, forecast_date, warehouse_stock, online_total,
                payload_json, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(category, supplier, lot_id, snapshot_date) DO UPDATE SET
                batch_id = excluded.batch_id,
                status = excluded.status,
                current_stage = excluded.current_stage,
                stage_quantities = excluded.stage_quantities,
                forecast_date = excluded.forecast_date,
                warehouse_stock = excluded.warehouse_stock,
                online_total = excluded.online_total,
                payload_json = excluded.payload_json,
                recorded_at = excluded.recorded_at
            "#,
            params![
                record.category.as_str(),
                record.supplier,
                record.lot_id,
                record.snapshot_date,
                batch_id,
                record.status.as_str(),
                record.current_stage,
                record.stage_quantities.to_json()?,
                record.forecast_date,
                record.warehouse_stock,
                record.online_total,
                serde_json::to_string(record)?,
                now,
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find(
        &self,
        category: WipCategory,
        supplier: &str,
        lot_id: &str,
    ) -> RepositoryResult<Option<CanonicalWipRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE supplier = ?1 AND lot_id = ?2",
            CURRENT_COLUMNS,
            category.current_table()
        );
        let record = conn
            .query_row(&sql, params![supplier, lot_id], |row| {
                map_current_row(row, category)
            })
            .optional()?;
        Ok(record)
    }

    /// 当前视图（可按供应商过滤）
    pub fn list(
        &self,
        category: WipCategory,
        supplier: Option<&str>,
    ) -> RepositoryResult<Vec<CanonicalWipRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE (?1 IS NULL OR supplier = ?1) ORDER BY supplier, lot_id",
            CURRENT_COLUMNS,
            category.current_table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![supplier], |row| map_current_row(row, category))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count(&self, category: WipCategory) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT COUNT(*) FROM {}", category.current_table());
        Ok(conn.query_row(&sql, [], |row| row.get(0))?)
    }

    pub fn count_history(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM wip_snapshot_history", [], |row| {
            row.get(0)
        })?)
    }

    pub fn history(
        &self,
        category: WipCategory,
        supplier: &str,
        lot_id: &str,
    ) -> RepositoryResult<Vec<HistoryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT snapshot_date, batch_id, status, current_stage, warehouse_stock, online_total
            FROM wip_snapshot_history
            WHERE category = ?1 AND supplier = ?2 AND lot_id = ?3
            ORDER BY snapshot_date
            "#,
        )?;
        let rows = stmt.query_map(params![category.as_str(), supplier, lot_id], |row| {
            Ok(HistoryEntry {
                snapshot_date: row.get(0)?,
                batch_id: row.get(1)?,
                status: row.get(2)?,
                current_stage: row.get(3)?,
                warehouse_stock: row.get(4)?,
                online_total: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// WIP 汇总（总数/在制/完成/平均完成率）
    pub fn summary(&self, category: WipCategory) -> RepositoryResult<WipSummary> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN finished_at IS NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN finished_at IS NOT NULL THEN 1 ELSE 0 END), 0),
                AVG(CASE WHEN layer_count > 0 AND current_position IS NOT NULL
                         THEN CAST(current_position AS REAL) * 100.0 / layer_count END)
            FROM {}
            "#,
            category.current_table()
        );
        let summary = conn.query_row(&sql, [], |row| {
            Ok(WipSummary {
                category,
                total_count: row.get(0)?,
                in_progress_count: row.get(1)?,
                completed_count: row.get(2)?,
                avg_completion_rate: row
                    .get::<_, Option<f64>>(3)?
                    .map(|rate| (rate * 100.0).round() / 100.0),
            })
        })?;
        Ok(summary)
    }

    /// 延期项目: 未完成且交期早于 today - days_threshold
    pub fn delayed_items(
        &self,
        category: WipCategory,
        today: NaiveDate,
        days_threshold: i64,
    ) -> RepositoryResult<Vec<CanonicalWipRecord>> {
        let cutoff = today - chrono::Duration::days(days_threshold);
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM {}
            WHERE finished_at IS NULL AND forecast_date IS NOT NULL AND forecast_date < ?1
            ORDER BY forecast_date, supplier, lot_id
            "#,
            CURRENT_COLUMNS,
            category.current_table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cutoff], |row| map_current_row(row, category))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// 未来 days 天内（含两端）按交期统计的未完成 lot 数
    pub fn completion_forecast(
        &self,
        category: WipCategory,
        today: NaiveDate,
        days: i64,
    ) -> RepositoryResult<BTreeMap<NaiveDate, i64>> {
        let end = today + chrono::Duration::days(days);
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT forecast_date, COUNT(*) FROM {}
            WHERE finished_at IS NULL AND forecast_date BETWEEN ?1 AND ?2
            GROUP BY forecast_date
            "#,
            category.current_table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![today, end], |row| {
            Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, i64>(1)?))
        })?;
        rows.collect::<Result<BTreeMap<_, _>, _>>().map_err(Into::into)
    }
}

fn map_current_row(row: &Row<'_>, category: WipCategory) -> rusqlite::Result<CanonicalWipRecord> {
    let stage_json: String = row.get(6)?;
    let stage_quantities = StageQuantities::from_json(&stage_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let status: String = row.get(5)?;

    Ok(CanonicalWipRecord {
        category,
        supplier: row.get(0)?,
        lot_id: row.get(1)?,
        purchase_order: row.get(2)?,
        item_name: row.get(3)?,
        quantity: row.get(4)?,
        status: WipStatus::from_label(Some(status.as_str())),
        stage_quantities,
        layer_count: row.get(7)?,
        remain_layer: row.get(8)?,
        current_position: row.get(9)?,
        current_stage: row.get(10)?,
        forecast_date: row.get(11)?,
        next_day_forecast: row.get(12)?,
        three_day_forecast: row.get(13)?,
        seven_day_forecast: row.get(14)?,
        warehouse_stock: row.get(15)?,
        online_total: row.get(16)?,
        hold_info: row.get(17)?,
        snapshot_date: row.get(18)?,
        finished_at: row.get(19)?,
    })
}
