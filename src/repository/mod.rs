// ==========================================
// 参数化数据导入 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 定义导入管道的外部协作者接口，并提供 SQLite / 文件实现
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod metadata_repo;
pub mod metadata_repo_impl;
pub mod result_repo;
pub mod selection_repo;
pub mod table_source;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use metadata_repo::MetadataStore;
pub use metadata_repo_impl::MetadataRepository;
pub use result_repo::{ResultRepository, ResultStore, DEFAULT_BUFFER_CAPACITY};
pub use selection_repo::{path_in_scope, SelectionRangeRepository, SelectionSource};
pub use table_source::{DirectoryTableSource, MemoryTableSource, TableSource};
