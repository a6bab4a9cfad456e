// ==========================================
// 参数化数据导入 - 引擎层
// ==========================================
// 职责: 驱动导入运行（编排、表缓存、进度、数据集互斥）
// 红线: Engine 不拼 SQL，数据访问全部经由协作者 trait
// ==========================================

pub mod collaborators;
pub mod dataset_lock;
pub mod orchestrator;
pub mod progress;
pub mod table_cache;

// 重导出核心引擎
pub use collaborators::ImportCollaborators;
pub use dataset_lock::{DatasetLock, DatasetLockGuard, InProcessDatasetLock};
pub use orchestrator::PipelineOrchestrator;
pub use progress::{NoOpProgressSink, ProgressSink, TracingProgressSink};
pub use table_cache::TableCache;
