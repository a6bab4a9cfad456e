// ==========================================
// 参数化数据导入 - 领域模型层
// ==========================================
// 职责: 定义值类型、选区、表快照、分类图、元数据实体与导入报告
// 红线: 不含数据访问逻辑,不含流程编排逻辑
// ==========================================

pub mod category;
pub mod metadata;
pub mod report;
pub mod selection;
pub mod table;
pub mod types;
pub mod value;

// 重导出核心类型
pub use category::{AssemblyId, CategoryAssembly, CategoryGraph};
pub use metadata::{
    ExistingSeries, Field, NewSeries, ParameterDefinition, QuantityContainerRecord,
    QuantityDefinition, ResearchDelta,
};
pub use report::{Diagnostics, ImportReport, SkippedSeries};
pub use selection::SelectionRange;
pub use table::TableSnapshot;
pub use types::{CategoryKind, HeaderOrientation, ValueType};
pub use value::Value;
