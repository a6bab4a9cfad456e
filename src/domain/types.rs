// ==========================================
// 参数化数据导入 - 基础枚举类型
// ==========================================
// 职责: 值类型 / 表头方向 / 分类层级
// 约定: 数据库与 JSON 中统一使用 SCREAMING_SNAKE_CASE
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 值类型 (Value Type)
// ==========================================
// 顺序即写入顺序之外的排序键，见 Value 的 Ord 实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    String,
    Int32,
    Int64,
    Float,
    Double,
}

impl ValueType {
    /// 结果流式写入时的分组顺序
    pub const WRITE_ORDER: [ValueType; 5] = [
        ValueType::String,
        ValueType::Double,
        ValueType::Float,
        ValueType::Int32,
        ValueType::Int64,
    ];

    /// 从数据库字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STRING" => Some(ValueType::String),
            "INT32" => Some(ValueType::Int32),
            "INT64" => Some(ValueType::Int64),
            "FLOAT" => Some(ValueType::Float),
            "DOUBLE" => Some(ValueType::Double),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "STRING"),
            ValueType::Int32 => write!(f, "INT32"),
            ValueType::Int64 => write!(f, "INT64"),
            ValueType::Float => write!(f, "FLOAT"),
            ValueType::Double => write!(f, "DOUBLE"),
        }
    }
}

// ==========================================
// 表头方向 (Header Orientation)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaderOrientation {
    Horizontal, // 表头在第 0 行，字段按列排列
    Vertical,   // 表头在第 0 列，字段按行排列
}

impl HeaderOrientation {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HORIZONTAL" => Some(HeaderOrientation::Horizontal),
            "VERTICAL" => Some(HeaderOrientation::Vertical),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderOrientation::Horizontal => write!(f, "HORIZONTAL"),
            HeaderOrientation::Vertical => write!(f, "VERTICAL"),
        }
    }
}

// ==========================================
// 分类层级 (Category Kind)
// ==========================================
// 链路: Research → Series → Parameter → Quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryKind {
    Research,  // 研究元数据（每个数据集唯一）
    Series,    // 测量序列
    Parameter, // 自变量
    Quantity,  // 因变量
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKind::Research => write!(f, "RESEARCH"),
            CategoryKind::Series => write!(f, "SERIES"),
            CategoryKind::Parameter => write!(f, "PARAMETER"),
            CategoryKind::Quantity => write!(f, "QUANTITY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_round_trip_through_display() {
        for t in ValueType::WRITE_ORDER {
            assert_eq!(ValueType::from_str(&t.to_string()), Some(t));
        }
        assert_eq!(ValueType::from_str(" double "), Some(ValueType::Double));
        assert_eq!(ValueType::from_str("DECIMAL"), None);
    }

    #[test]
    fn test_write_order_places_float_after_double() {
        let order = ValueType::WRITE_ORDER;
        assert_eq!(order[0], ValueType::String);
        assert_eq!(order[1], ValueType::Double);
        assert_eq!(order[2], ValueType::Float);
        assert_eq!(order[4], ValueType::Int64);
    }

    #[test]
    fn test_orientation_parse() {
        assert_eq!(
            HeaderOrientation::from_str("vertical"),
            Some(HeaderOrientation::Vertical)
        );
        assert_eq!(HeaderOrientation::from_str("diagonal"), None);
    }
}
