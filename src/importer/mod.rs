// ==========================================
// 参数化数据导入 - 导入层
// ==========================================
// 职责: 选区分类、字段抽取、一致性校验、索引分配
// 支持: Excel, CSV 表文件
// ==========================================

// 模块声明
pub mod classifier;
pub mod consistency_checker;
pub mod error;
pub mod field_naming;
pub mod index_manager;
pub mod range_extractor;
pub mod table_parser;
pub mod value_converter;

// 重导出核心类型
pub use classifier::{Classification, Classifier};
pub use consistency_checker::{ConsistencyChecker, SeriesChain};
pub use error::{ImportError, ImportResult, SeriesValidationError};
pub use index_manager::IndexManager;
pub use range_extractor::{LoadedTables, RangeExtractor, ResolvedRange};
pub use table_parser::{CsvTableParser, ExcelTableParser, TableFileParser, UniversalTableParser};
pub use value_converter::{convert_cell, CastFailure};
