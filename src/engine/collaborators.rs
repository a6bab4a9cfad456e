// ==========================================
// 参数化数据导入 - 外部协作者聚合
// ==========================================
// 职责: 聚合导入管道依赖的全部外部协作者
// 目标: 编排器只接收一个参数；测试时可整体替换为内存实现
// ==========================================

use crate::engine::dataset_lock::{DatasetLock, InProcessDatasetLock};
use crate::engine::progress::{ProgressSink, TracingProgressSink};
use crate::repository::{MetadataStore, ResultStore, SelectionSource, TableSource};
use std::sync::Arc;

/// 导入管道协作者集合
///
/// # 包含
/// - `selection_source`: 选区来源
/// - `table_source`: 表数据源
/// - `metadata_store`: 元数据存储
/// - `result_store`: 量容器结果存储
/// - `progress`: 进度上报
/// - `lock`: 数据集互斥
#[derive(Clone)]
pub struct ImportCollaborators {
    pub selection_source: Arc<dyn SelectionSource>,
    pub table_source: Arc<dyn TableSource>,
    pub metadata_store: Arc<dyn MetadataStore>,
    pub result_store: Arc<dyn ResultStore>,
    pub progress: Arc<dyn ProgressSink>,
    pub lock: Arc<dyn DatasetLock>,
}

impl ImportCollaborators {
    /// 创建协作者集合（进度转发到 tracing，进程内数据集锁）
    pub fn new(
        selection_source: Arc<dyn SelectionSource>,
        table_source: Arc<dyn TableSource>,
        metadata_store: Arc<dyn MetadataStore>,
        result_store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            selection_source,
            table_source,
            metadata_store,
            result_store,
            progress: Arc::new(TracingProgressSink),
            lock: Arc::new(InProcessDatasetLock::new()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_lock(mut self, lock: Arc<dyn DatasetLock>) -> Self {
        self.lock = lock;
        self
    }
}
