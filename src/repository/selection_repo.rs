// ==========================================
// 参数化数据导入 - 选区仓储
// ==========================================
// 职责: selection_range 表的读写（选区由外部预先录入）
// 红线: 不含分类逻辑，只负责数据访问
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::selection::SelectionRange;
use crate::domain::types::{HeaderOrientation, ValueType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// SelectionSource Trait
// ==========================================
// 实现者: SelectionRangeRepository（rusqlite）/ 测试中的内存实现
pub trait SelectionSource: Send + Sync {
    /// 列出某个作用域下的全部选区
    ///
    /// # 参数
    /// - scope: 路径前缀（如 "Base"）；空串表示全部
    ///
    /// # 返回
    /// - 按录入顺序排列的选区
    fn list_selection_ranges(&self, scope: &str) -> RepositoryResult<Vec<SelectionRange>>;
}

/// 路径是否落在作用域内（整段匹配，"Base" 不匹配 "Baseline/..."）
pub fn path_in_scope(path: &str, scope: &str, separator: &str) -> bool {
    if scope.is_empty() || path == scope {
        return true;
    }
    path.strip_prefix(scope)
        .map_or(false, |rest| rest.starts_with(separator))
}

// ==========================================
// SelectionRangeRepository
// ==========================================
pub struct SelectionRangeRepository {
    conn: Arc<Mutex<Connection>>,
    separator: String,
}

impl SelectionRangeRepository {
    /// 创建新的 SelectionRangeRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建仓储实例（路径分隔符默认 "/"）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            separator: "/".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 录入一个选区
    ///
    /// # 返回
    /// - Ok(i64): 新记录的 range_id
    pub fn insert_range(&self, range: &SelectionRange) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO selection_range (
                path, table_name, header_orientation,
                top_row, bottom_row, left_column, right_column,
                select_entire_row, select_entire_column,
                declared_type, decimal_delimiter
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                range.path,
                range.table_name,
                range.header_orientation.to_string(),
                range.top_row,
                range.bottom_row,
                range.left_column,
                range.right_column,
                range.select_entire_row,
                range.select_entire_column,
                range.declared_type.to_string(),
                range.decimal_delimiter.to_string(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 批量录入（单事务）
    pub fn insert_ranges(&self, ranges: &[SelectionRange]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        for range in ranges {
            tx.execute(
                r#"
                INSERT INTO selection_range (
                    path, table_name, header_orientation,
                    top_row, bottom_row, left_column, right_column,
                    select_entire_row, select_entire_column,
                    declared_type, decimal_delimiter
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    range.path,
                    range.table_name,
                    range.header_orientation.to_string(),
                    range.top_row,
                    range.bottom_row,
                    range.left_column,
                    range.right_column,
                    range.select_entire_row,
                    range.select_entire_column,
                    range.declared_type.to_string(),
                    range.decimal_delimiter.to_string(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(ranges.len())
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawRangeRow> {
        Ok(RawRangeRow {
            path: row.get(0)?,
            table_name: row.get(1)?,
            header_orientation: row.get(2)?,
            top_row: row.get(3)?,
            bottom_row: row.get(4)?,
            left_column: row.get(5)?,
            right_column: row.get(6)?,
            select_entire_row: row.get(7)?,
            select_entire_column: row.get(8)?,
            declared_type: row.get(9)?,
            decimal_delimiter: row.get(10)?,
        })
    }
}

/// 数据库原始行，转换为 SelectionRange 时校验枚举取值
struct RawRangeRow {
    path: String,
    table_name: String,
    header_orientation: String,
    top_row: u32,
    bottom_row: u32,
    left_column: u32,
    right_column: u32,
    select_entire_row: bool,
    select_entire_column: bool,
    declared_type: String,
    decimal_delimiter: String,
}

impl RawRangeRow {
    fn into_range(self) -> RepositoryResult<SelectionRange> {
        let header_orientation = HeaderOrientation::from_str(&self.header_orientation).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "header_orientation".to_string(),
                message: format!("未知表头方向 {} (path={})", self.header_orientation, self.path),
            }
        })?;
        let declared_type = ValueType::from_str(&self.declared_type).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "declared_type".to_string(),
                message: format!("未知值类型 {} (path={})", self.declared_type, self.path),
            }
        })?;
        let decimal_delimiter = self.decimal_delimiter.chars().next().unwrap_or('.');

        Ok(SelectionRange {
            path: self.path,
            table_name: self.table_name,
            header_orientation,
            top_row: self.top_row,
            bottom_row: self.bottom_row,
            left_column: self.left_column,
            right_column: self.right_column,
            select_entire_row: self.select_entire_row,
            select_entire_column: self.select_entire_column,
            declared_type,
            decimal_delimiter,
        })
    }
}

impl SelectionSource for SelectionRangeRepository {
    fn list_selection_ranges(&self, scope: &str) -> RepositoryResult<Vec<SelectionRange>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT path, table_name, header_orientation,
                   top_row, bottom_row, left_column, right_column,
                   select_entire_row, select_entire_column,
                   declared_type, decimal_delimiter
            FROM selection_range
            ORDER BY range_id
            "#,
        )?;

        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .filter(|row| path_in_scope(&row.path, scope, &self.separator))
            .map(RawRangeRow::into_range)
            .collect()
    }
}
