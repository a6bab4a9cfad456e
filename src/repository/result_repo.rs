// ==========================================
// 参数化数据导入 - 结果存储（量容器）
// ==========================================
// 职责: 量容器记录只写追加；内存缓冲满即落盘，flush() 单事务提交
// 红线: 不做重试，写入失败直接上抛，未落盘的记录留在缓冲中
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::metadata::QuantityContainerRecord;
use crate::domain::value::Value;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// 默认缓冲容量
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

// ==========================================
// ResultStore Trait
// ==========================================
pub trait ResultStore: Send + Sync {
    /// 追加一条量容器记录（可能触发自动落盘）
    fn append_quantity_container(&self, scope: &str, record: QuantityContainerRecord) -> RepositoryResult<()>;

    /// 将缓冲中的记录全部落盘
    ///
    /// 写入失败时记录保留在缓冲中，由调用方决定是否重试
    ///
    /// # 返回
    /// - Ok(usize): 本次落盘的记录数
    fn flush(&self) -> RepositoryResult<usize>;
}

// ==========================================
// ResultRepository
// ==========================================
pub struct ResultRepository {
    conn: Arc<Mutex<Connection>>,
    buffer: Mutex<Vec<(String, QuantityContainerRecord)>>,
    capacity: usize,
}

impl ResultRepository {
    /// 创建新的 ResultRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - capacity: 缓冲容量（0 按 1 处理）
    pub fn new(db_path: &str, capacity: usize) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn)), capacity))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            conn,
            buffer: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn write_batch(&self, batch: &[(String, QuantityContainerRecord)]) -> RepositoryResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO quantity_container (
                    scope, series_index, quantity_index, parameter_value_indices, value_type, value_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (scope, record) in batch {
                stmt.execute(params![
                    scope,
                    record.series_index,
                    record.quantity_index,
                    serde_json::to_string(&record.parameter_value_indices)?,
                    record.value.value_type().to_string(),
                    serde_json::to_string(&record.value)?,
                ])?;
            }
        }
        tx.commit()?;
        debug!(records = batch.len(), "量容器记录已落盘");
        Ok(())
    }

    /// 已落盘的记录数
    pub fn count_records(&self, scope: &str) -> RepositoryResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM quantity_container WHERE scope = ?1",
            params![scope],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// 按写入顺序读取某个序列的记录
    pub fn list_records(&self, scope: &str, series_index: u32) -> RepositoryResult<Vec<QuantityContainerRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT series_index, quantity_index, parameter_value_indices, value_json
            FROM quantity_container
            WHERE scope = ?1 AND series_index = ?2
            ORDER BY record_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![scope, series_index], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(series_index, quantity_index, indices_json, value_json)| -> RepositoryResult<_> {
                let value: Value = serde_json::from_str(&value_json)?;
                Ok(QuantityContainerRecord {
                    series_index,
                    quantity_index,
                    parameter_value_indices: serde_json::from_str(&indices_json)?,
                    value,
                })
            })
            .collect()
    }

    /// 缓冲中尚未落盘的记录数
    pub fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

impl ResultStore for ResultRepository {
    fn append_quantity_container(&self, scope: &str, record: QuantityContainerRecord) -> RepositoryResult<()> {
        let full = {
            let mut buffer = self
                .buffer
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            buffer.push((scope.to_string(), record));
            buffer.len() >= self.capacity
        };
        if full {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> RepositoryResult<usize> {
        let batch = {
            let mut buffer = self
                .buffer
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            std::mem::take(&mut *buffer)
        };
        if let Err(e) = self.write_batch(&batch) {
            // 放回缓冲头部，保持写入顺序
            if let Ok(mut buffer) = self.buffer.lock() {
                let appended = std::mem::replace(&mut *buffer, batch);
                buffer.extend(appended);
            }
            return Err(e);
        }
        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo(capacity: usize) -> ResultRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ResultRepository::from_connection(Arc::new(Mutex::new(conn)), capacity)
    }

    fn record(value: f64) -> QuantityContainerRecord {
        QuantityContainerRecord {
            series_index: 1,
            quantity_index: 1,
            parameter_value_indices: vec![1, 2],
            value: Value::Double(value),
        }
    }

    #[test]
    fn test_auto_flush_when_buffer_full() {
        let repo = repo(2);
        repo.append_quantity_container("Base", record(0.5)).unwrap();
        assert_eq!(repo.pending(), 1);
        assert_eq!(repo.count_records("Base").unwrap(), 0);

        repo.append_quantity_container("Base", record(1.5)).unwrap();
        assert_eq!(repo.pending(), 0);
        assert_eq!(repo.count_records("Base").unwrap(), 2);

        repo.append_quantity_container("Base", record(2.5)).unwrap();
        assert_eq!(repo.flush().unwrap(), 1);
        assert_eq!(repo.flush().unwrap(), 0);

        let stored = repo.list_records("Base", 1).unwrap();
        assert_eq!(stored, vec![record(0.5), record(1.5), record(2.5)]);
    }

    #[test]
    fn test_failed_flush_keeps_buffered_records() {
        let repo = repo(10);
        repo.append_quantity_container("Base", record(0.5)).unwrap();
        repo.get_conn()
            .unwrap()
            .execute_batch("ALTER TABLE quantity_container RENAME TO quantity_container_off")
            .unwrap();

        assert!(repo.flush().is_err());
        assert_eq!(repo.pending(), 1);

        repo.append_quantity_container("Base", record(1.5)).unwrap();
        repo.get_conn()
            .unwrap()
            .execute_batch("ALTER TABLE quantity_container_off RENAME TO quantity_container")
            .unwrap();
        assert_eq!(repo.flush().unwrap(), 2);
        assert_eq!(
            repo.list_records("Base", 1).unwrap(),
            vec![record(0.5), record(1.5)]
        );
    }

    #[test]
    fn test_zero_capacity_writes_through() {
        let repo = repo(0);
        repo.append_quantity_container("Base", record(0.5)).unwrap();
        assert_eq!(repo.count_records("Base").unwrap(), 1);
        assert_eq!(repo.count_records("Other").unwrap(), 0);
    }
}
