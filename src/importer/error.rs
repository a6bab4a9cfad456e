// ==========================================
// 参数化数据导入 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层:
// - ImportError: 整次运行中止（写入前发现）
// - SeriesValidationError: 仅跳过当前序列，运行继续
// ==========================================

use crate::domain::types::{CategoryKind, ValueType};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型（运行级）
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 分类/配置错误 =====
    #[error("缺少 Research 根分类")]
    MissingResearchRoot,

    #[error("存在多个 Research 根分类: {}", .0.join(", "))]
    AmbiguousResearchRoot(Vec<String>),

    #[error("参数类型重定义: {parameter} 已定义为 {existing}，不能再定义为 {requested}")]
    ParameterTypeRedefinition {
        parameter: String,
        existing: ValueType,
        requested: ValueType,
    },

    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 协作方错误 =====
    #[error("选区读取失败: {0}")]
    SelectionSourceError(String),

    #[error("元数据存储失败: {0}")]
    MetadataStoreError(String),

    #[error("结果存储写入失败: {0}")]
    ResultStoreError(String),

    #[error("数据集锁获取失败: {0}")]
    DatasetLockError(String),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 配置类错误（数据集定义本身有问题）
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ImportError::MissingResearchRoot
                | ImportError::AmbiguousResearchRoot(_)
                | ImportError::ParameterTypeRedefinition { .. }
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::MetadataStoreError(err.to_string())
    }
}

// 实现 From<RepositoryError>（未区分来源时按元数据存储处理）
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        ImportError::MetadataStoreError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

// ==========================================
// SeriesValidationError - 序列级校验错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesValidationError {
    #[error("缺少 {missing} 分类")]
    MissingContinuation { missing: CategoryKind },

    #[error("Parameter 与 Quantity 引用了多张表: {}", .tables.join(", "))]
    MultipleTables { tables: Vec<String> },

    #[error(
        "行数不一致: Parameter 组 [{}]，Quantity 组 [{}]",
        format_sizes(.parameter_sizes),
        format_sizes(.quantity_sizes)
    )]
    RowCountMismatch {
        parameter_sizes: Vec<(String, usize)>,
        quantity_sizes: Vec<(String, usize)>,
    },

    #[error("选区超出表范围: {}", .ranges.join(", "))]
    RangeOutOfBounds { ranges: Vec<String> },

    #[error("类型转换失败 {count} 处（详见诊断信息）")]
    CastFailures { count: usize },

    #[error("表不可用 ({table}): {message}")]
    TableUnavailable { table: String, message: String },

    #[error("表头为空: 选区 {range} 第 {position} 个字段")]
    EmptyHeader { range: String, position: usize },

    #[error("量类型冲突: {quantity} 已定义为 {existing}，本次声明为 {declared}")]
    QuantityTypeMismatch {
        quantity: String,
        existing: ValueType,
        declared: ValueType,
    },
}

fn format_sizes(sizes: &[(String, usize)]) -> String {
    sizes
        .iter()
        .map(|(name, size)| format!("{}={}", name, size))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_mismatch_names_both_groups() {
        let err = SeriesValidationError::RowCountMismatch {
            parameter_sizes: vec![("Voltage".to_string(), 5), ("Current".to_string(), 5)],
            quantity_sizes: vec![("Power".to_string(), 4)],
        };
        let text = err.to_string();
        assert!(text.contains("Voltage=5"));
        assert!(text.contains("Power=4"));
    }

    #[test]
    fn test_configuration_error_classification() {
        assert!(ImportError::MissingResearchRoot.is_configuration_error());
        assert!(!ImportError::ResultStoreError("x".to_string()).is_configuration_error());
    }

    #[test]
    fn test_out_of_bounds_lists_every_range() {
        let err = SeriesValidationError::RangeOutOfBounds {
            ranges: vec!["A".to_string(), "B".to_string()],
        };
        assert_eq!(err.to_string(), "选区超出表范围: A, B");
    }
}
