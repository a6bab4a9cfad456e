// ==========================================
// 参数化数据导入 - 单次运行的表缓存
// ==========================================
// 职责: 按需加载表快照；只保留仍被未处理分类节点引用的表
// 生命周期: 归属单次运行，运行结束即丢弃
// ==========================================

use crate::importer::error::SeriesValidationError;
use crate::importer::range_extractor::LoadedTables;
use crate::repository::table_source::TableSource;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub struct TableCache {
    source: Arc<dyn TableSource>,
    tables: LoadedTables,
    loads: usize,
}

impl TableCache {
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        Self {
            source,
            tables: LoadedTables::new(),
            loads: 0,
        }
    }

    /// 淘汰不再被引用的表
    ///
    /// # 返回
    /// - 淘汰的表数量
    pub fn retain_referenced(&mut self, referenced: &BTreeSet<String>) -> usize {
        let before = self.tables.len();
        self.tables.retain(|name, _| referenced.contains(name));
        let evicted = before - self.tables.len();
        if evicted > 0 {
            debug!(evicted = evicted, cached = self.tables.len(), "淘汰表缓存");
        }
        evicted
    }

    /// 确保给定表已加载
    ///
    /// # 返回
    /// - Err(TableUnavailable): 表源加载失败
    pub fn ensure_loaded<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), SeriesValidationError> {
        for name in names {
            if self.tables.contains_key(name) {
                continue;
            }
            let table = self
                .source
                .load_table(name)
                .map_err(|e| SeriesValidationError::TableUnavailable {
                    table: name.to_string(),
                    message: e.to_string(),
                })?;
            self.loads += 1;
            debug!(table = %name, rows = table.rows(), cols = table.cols(), "表已加载");
            self.tables.insert(name.to_string(), Arc::new(table));
        }
        Ok(())
    }

    pub fn tables(&self) -> &LoadedTables {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// 本次运行实际从表源加载的次数
    pub fn loads(&self) -> usize {
        self.loads
    }
}
