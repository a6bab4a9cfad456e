// ==========================================
// 参数化数据导入 - 表数据源
// ==========================================
// 职责: 按表名提供只读表快照
// 实现:
// - DirectoryTableSource: <dir>/<name>.csv | .xlsx | .xls
// - MemoryTableSource: 进程内表（测试与嵌入式调用）
// ==========================================

use crate::domain::table::TableSnapshot;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::table_parser::{TableFileParser, UniversalTableParser};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::debug;

// ==========================================
// TableSource Trait
// ==========================================
pub trait TableSource: Send + Sync {
    /// 按表名加载表快照
    ///
    /// # 返回
    /// - Err(FileNotFound): 表不存在
    fn load_table(&self, table_name: &str) -> ImportResult<TableSnapshot>;
}

// ==========================================
// DirectoryTableSource
// ==========================================
const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "xlsx", "xls"];

pub struct DirectoryTableSource {
    root: PathBuf,
    parser: Box<dyn TableFileParser>,
}

impl DirectoryTableSource {
    /// # 参数
    /// - root: 表文件所在目录
    /// - csv_delimiter: CSV 字段分隔符
    /// - decimal_delimiter: CSV 表的小数分隔符
    pub fn new(root: impl Into<PathBuf>, csv_delimiter: u8, decimal_delimiter: char) -> Self {
        Self {
            root: root.into(),
            parser: Box::new(UniversalTableParser::new(csv_delimiter, decimal_delimiter)),
        }
    }

    pub fn with_parser(root: impl Into<PathBuf>, parser: Box<dyn TableFileParser>) -> Self {
        Self {
            root: root.into(),
            parser,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 按扩展名优先级查找表文件
    fn resolve(&self, table_name: &str) -> Option<PathBuf> {
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", table_name, ext)))
            .find(|candidate| candidate.is_file())
    }
}

impl TableSource for DirectoryTableSource {
    fn load_table(&self, table_name: &str) -> ImportResult<TableSnapshot> {
        let path = self.resolve(table_name).ok_or_else(|| {
            ImportError::FileNotFound(format!("{}/{}.{{csv,xlsx,xls}}", self.root.display(), table_name))
        })?;
        debug!(table = %table_name, path = %path.display(), "加载表文件");
        self.parser.parse_table(&path, table_name)
    }
}

// ==========================================
// MemoryTableSource
// ==========================================
#[derive(Default)]
pub struct MemoryTableSource {
    tables: RwLock<HashMap<String, TableSnapshot>>,
    loads: AtomicUsize,
}

impl MemoryTableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, table: TableSnapshot) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(table.name().to_string(), table);
        }
    }

    pub fn with_table(self, table: TableSnapshot) -> Self {
        self.insert(table);
        self
    }

    /// 累计 load_table 调用次数
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl TableSource for MemoryTableSource {
    fn load_table(&self, table_name: &str) -> ImportResult<TableSnapshot> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let tables = self
            .tables
            .read()
            .map_err(|e| ImportError::InternalError(e.to_string()))?;
        tables
            .get(table_name)
            .cloned()
            .ok_or_else(|| ImportError::FileNotFound(table_name.to_string()))
    }
}
