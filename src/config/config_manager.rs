// ==========================================
// 参数化数据导入 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式，随导入报告留档）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 读取非空字符串配置，空白值回退默认
    fn get_non_empty_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        let value = self.get_config_or_default(key, default)?;
        if value.trim().is_empty() {
            Ok(default.to_string())
        } else {
            Ok(value)
        }
    }
}

impl ImportConfigReader for ConfigManager {
    // ===== 分类配置 =====

    fn get_parameter_folder(&self) -> Result<String, Box<dyn Error>> {
        self.get_non_empty_or_default(config_keys::PARAMETER_FOLDER, defaults::PARAMETER_FOLDER)
    }

    fn get_quantity_folder(&self) -> Result<String, Box<dyn Error>> {
        self.get_non_empty_or_default(config_keys::QUANTITY_FOLDER, defaults::QUANTITY_FOLDER)
    }

    fn get_path_separator(&self) -> Result<String, Box<dyn Error>> {
        // 分隔符不做 trim，允许多字符
        let value = self.get_config_or_default(config_keys::PATH_SEPARATOR, defaults::PATH_SEPARATOR)?;
        if value.is_empty() {
            Ok(defaults::PATH_SEPARATOR.to_string())
        } else {
            Ok(value)
        }
    }

    fn get_dataset_folder(&self) -> Result<String, Box<dyn Error>> {
        self.get_non_empty_or_default(config_keys::DATASET_FOLDER, defaults::DATASET_FOLDER)
    }

    // ===== 字段命名配置 =====

    fn get_parameter_prefix(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::PARAMETER_PREFIX, defaults::PARAMETER_PREFIX)
    }

    fn get_quantity_prefix(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::QUANTITY_PREFIX, defaults::QUANTITY_PREFIX)
    }

    // ===== 读写配置 =====

    fn get_result_buffer_size(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::RESULT_BUFFER_SIZE, "1000")?;
        Ok(value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(defaults::RESULT_BUFFER_SIZE))
    }

    fn get_default_decimal_delimiter(&self) -> Result<char, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DECIMAL_DELIMITER, ".")?;
        Ok(value.trim().chars().next().unwrap_or(defaults::DECIMAL_DELIMITER))
    }

    fn get_csv_delimiter(&self) -> Result<u8, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::CSV_DELIMITER, ",")?;
        // "\t" 按制表符处理
        let delimiter = match value.as_str() {
            "\\t" | "\t" => b'\t',
            other => other
                .bytes()
                .next()
                .filter(|b| b.is_ascii())
                .unwrap_or(defaults::CSV_DELIMITER),
        };
        Ok(delimiter)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分类
    pub const PARAMETER_FOLDER: &str = "parameter_folder";
    pub const QUANTITY_FOLDER: &str = "quantity_folder";
    pub const PATH_SEPARATOR: &str = "path_separator";
    pub const DATASET_FOLDER: &str = "dataset_folder";

    // 字段命名
    pub const PARAMETER_PREFIX: &str = "parameter_prefix";
    pub const QUANTITY_PREFIX: &str = "quantity_prefix";

    // 读写
    pub const RESULT_BUFFER_SIZE: &str = "result_buffer_size";
    pub const DECIMAL_DELIMITER: &str = "decimal_delimiter";
    pub const CSV_DELIMITER: &str = "csv_delimiter";
}

// ==========================================
// 默认值常量
// ==========================================
pub mod defaults {
    pub const PARAMETER_FOLDER: &str = "Parameter";
    pub const QUANTITY_FOLDER: &str = "Quantity";
    pub const PATH_SEPARATOR: &str = "/";
    pub const DATASET_FOLDER: &str = "Dataset";
    pub const PARAMETER_PREFIX: &str = "P_";
    pub const QUANTITY_PREFIX: &str = "Q_";
    pub const RESULT_BUFFER_SIZE: usize = 1000;
    pub const DECIMAL_DELIMITER: char = '.';
    pub const CSV_DELIMITER: u8 = b',';
}
