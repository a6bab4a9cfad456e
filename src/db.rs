// ==========================================
// 参数化数据导入 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 + busy_timeout）
// - 提供幂等的建表入口
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
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

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 创建全部表（IF NOT EXISTS，可重复执行）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS selection_range (
    range_id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    table_name TEXT NOT NULL,
    header_orientation TEXT NOT NULL,
    top_row INTEGER NOT NULL,
    bottom_row INTEGER NOT NULL,
    left_column INTEGER NOT NULL,
    right_column INTEGER NOT NULL,
    select_entire_row INTEGER NOT NULL DEFAULT 0,
    select_entire_column INTEGER NOT NULL DEFAULT 0,
    declared_type TEXT NOT NULL,
    decimal_delimiter TEXT NOT NULL DEFAULT '.',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_selection_range_path ON selection_range(path);

CREATE TABLE IF NOT EXISTS series_metadata (
    scope TEXT NOT NULL,
    name TEXT NOT NULL,
    series_index INTEGER NOT NULL,
    record_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    PRIMARY KEY (scope, name)
);

CREATE TABLE IF NOT EXISTS series_field (
    scope TEXT NOT NULL,
    series_name TEXT NOT NULL,
    field_name TEXT NOT NULL,
    unit TEXT,
    value_type TEXT NOT NULL,
    values_json TEXT NOT NULL,
    PRIMARY KEY (scope, series_name, field_name),
    FOREIGN KEY (scope, series_name) REFERENCES series_metadata(scope, name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS parameter_definition (
    scope TEXT NOT NULL,
    name TEXT NOT NULL,
    abbreviation INTEGER NOT NULL,
    value_type TEXT NOT NULL,
    unit TEXT,
    PRIMARY KEY (scope, name)
);

CREATE TABLE IF NOT EXISTS parameter_value (
    scope TEXT NOT NULL,
    parameter_name TEXT NOT NULL,
    value_index INTEGER NOT NULL,
    value_json TEXT NOT NULL,
    PRIMARY KEY (scope, parameter_name, value_index),
    FOREIGN KEY (scope, parameter_name) REFERENCES parameter_definition(scope, name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS quantity_definition (
    scope TEXT NOT NULL,
    name TEXT NOT NULL,
    quantity_index INTEGER NOT NULL,
    abbreviation INTEGER NOT NULL,
    value_type TEXT NOT NULL,
    unit TEXT,
    PRIMARY KEY (scope, name)
);

CREATE TABLE IF NOT EXISTS series_parameter (
    scope TEXT NOT NULL,
    series_name TEXT NOT NULL,
    parameter_name TEXT NOT NULL,
    position INTEGER NOT NULL,
    is_constant INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (scope, series_name, parameter_name),
    FOREIGN KEY (scope, series_name) REFERENCES series_metadata(scope, name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS series_quantity (
    scope TEXT NOT NULL,
    series_name TEXT NOT NULL,
    quantity_name TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (scope, series_name, quantity_name),
    FOREIGN KEY (scope, series_name) REFERENCES series_metadata(scope, name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS research_field (
    scope TEXT NOT NULL,
    research_name TEXT NOT NULL,
    field_name TEXT NOT NULL,
    unit TEXT,
    value_type TEXT NOT NULL,
    values_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (scope, field_name)
);

CREATE TABLE IF NOT EXISTS import_report (
    report_id TEXT PRIMARY KEY,
    scope TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    report_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quantity_container (
    record_id INTEGER PRIMARY KEY AUTOINCREMENT,
    scope TEXT NOT NULL,
    series_index INTEGER NOT NULL,
    quantity_index INTEGER NOT NULL,
    parameter_value_indices TEXT NOT NULL,
    value_type TEXT NOT NULL,
    value_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_quantity_container_series
    ON quantity_container(scope, series_index, quantity_index);
"#;
