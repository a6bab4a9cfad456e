// ==========================================
// 参数化数据导入 - 核心库
// ==========================================
// 职责: 把用户在表格上标记的选区按类别路径归类为 Research/Series/Parameter/Quantity，
//       校验一致性、分配索引，并把元数据与量容器写入外部存储
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 协作者 trait 与 SQLite 实现
pub mod repository;

// 引擎层 - 导入编排
pub mod engine;

// 导入层 - 分类/抽取/校验/索引
pub mod importer;

// 配置层
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 异步外观
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    AssemblyId, CategoryGraph, CategoryKind, Diagnostics, HeaderOrientation, ImportReport,
    SelectionRange, TableSnapshot, Value, ValueType,
};

// 导入组件
pub use importer::{
    Classifier, ConsistencyChecker, ImportError, ImportResult, IndexManager, RangeExtractor,
    SeriesValidationError,
};

// 引擎
pub use engine::{ImportCollaborators, PipelineOrchestrator};

// API
pub use api::{ImportApi, ImportApiResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "参数化数据导入";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
