// ==========================================
// 供应商 WIP 跟踪系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少调度任务与手工导入并发时的 busy 错误
// - 建表语句集中在此处，表约束兜底记录不变量
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 当前视图表结构（wip_fab / wip_assy 共用）
///
/// 说明：
/// - 主键 (supplier, lot_id)，供应商之间键空间互不影响
/// - CHECK 约束：主键非空、剩余层数不超过总层数
fn current_table_ddl(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    supplier TEXT NOT NULL,
    lot_id TEXT NOT NULL CHECK (length(trim(lot_id)) > 0),
    purchase_order TEXT,
    item_name TEXT,
    quantity INTEGER,
    status TEXT NOT NULL DEFAULT 'in_progress',
    stage_quantities TEXT NOT NULL DEFAULT '[]',
    layer_count INTEGER,
    remain_layer INTEGER,
    current_position INTEGER,
    current_stage TEXT,
    forecast_date TEXT,
    next_day_forecast INTEGER,
    three_day_forecast INTEGER,
    seven_day_forecast INTEGER,
    warehouse_stock INTEGER NOT NULL DEFAULT 0,
    online_total INTEGER NOT NULL DEFAULT 0,
    hold_info TEXT,
    snapshot_date TEXT NOT NULL,
    finished_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (supplier, lot_id),
    CHECK (remain_layer IS NULL OR layer_count IS NULL OR remain_layer <= layer_count)
);
CREATE INDEX IF NOT EXISTS idx_{table}_finished ON {table}(finished_at);
"#
    )
}

const HISTORY_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS wip_snapshot_history (
    category TEXT NOT NULL,
    supplier TEXT NOT NULL,
    lot_id TEXT NOT NULL CHECK (length(trim(lot_id)) > 0),
    snapshot_date TEXT NOT NULL,
    batch_id TEXT NOT NULL,
    status TEXT NOT NULL,
    current_stage TEXT,
    stage_quantities TEXT NOT NULL DEFAULT '[]',
    forecast_date TEXT,
    warehouse_stock INTEGER NOT NULL DEFAULT 0,
    online_total INTEGER NOT NULL DEFAULT 0,
    payload_json TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (category, supplier, lot_id, snapshot_date)
);

CREATE TABLE IF NOT EXISTS daily_analysis (
    analysis_date TEXT PRIMARY KEY,
    supplier TEXT NOT NULL,
    buckets_json TEXT NOT NULL,
    total INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys / busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等），并写入当前 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&current_table_ddl("wip_fab"))?;
    conn.execute_batch(&current_table_ddl("wip_assy"))?;
    conn.execute_batch(HISTORY_DDL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
