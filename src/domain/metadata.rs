// ==========================================
// 参数化数据导入 - 元数据实体
// ==========================================
// 职责: 字段 / 参数定义 / 量定义 / 序列 / 研究元数据 / 量容器记录
// 编号: 参数缩写与取值索引、量索引均为 1 基正整数
// ==========================================

use crate::domain::types::ValueType;
use crate::domain::value::Value;
use serde::{Deserialize, Serialize};

// ==========================================
// Field - 抽取出的字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub unit: Option<String>,
    pub value_type: ValueType,
    pub values: Vec<Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            unit: None,
            value_type,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 只有一个取值或全部取值相同的参数视为常量，对所有行生效
    pub fn is_constant(&self) -> bool {
        match self.values.split_first() {
            Some((first, rest)) => rest.iter().all(|v| v == first),
            None => false,
        }
    }
}

// ==========================================
// ParameterDefinition - 参数定义
// ==========================================
// values 的下标 + 1 即取值索引，只追加不删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub unit: Option<String>,
    pub abbreviation: u32,
    pub value_type: ValueType,
    pub values: Vec<Value>,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, abbreviation: u32, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            unit: None,
            abbreviation,
            value_type,
            values: Vec::new(),
        }
    }

    /// 查找取值的索引（1 基）
    pub fn value_index(&self, value: &Value) -> Option<u32> {
        self.values
            .iter()
            .position(|v| v == value)
            .map(|pos| pos as u32 + 1)
    }

    /// 展示用缩写，如 "P_3"
    pub fn label(&self) -> String {
        format!("P_{}", self.abbreviation)
    }
}

// ==========================================
// QuantityDefinition - 量定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityDefinition {
    pub name: String,
    pub unit: Option<String>,
    pub abbreviation: u32,
    pub value_type: ValueType,
    /// 量容器记录中引用的量索引
    pub index: u32,
}

impl QuantityDefinition {
    pub fn new(name: impl Into<String>, index: u32, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            unit: None,
            abbreviation: index,
            value_type,
            index,
        }
    }

    /// 展示用缩写，如 "Q_1"
    pub fn label(&self) -> String {
        format!("Q_{}", self.abbreviation)
    }
}

// ==========================================
// ExistingSeries - 已持久化序列（回放用）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingSeries {
    pub name: String,
    pub index: u32,
    pub parameters: Vec<ParameterDefinition>,
    pub quantities: Vec<QuantityDefinition>,
}

// ==========================================
// NewSeries - 本次运行新建的序列
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSeries {
    pub name: String,
    pub index: u32,
    /// 直接挂在 Series 分类上的元数据字段
    pub metadata: Vec<Field>,
    /// 参数名，按参数缩写升序
    pub parameter_names: Vec<String>,
    /// 常量参数名
    pub constant_parameters: Vec<String>,
    pub quantity_names: Vec<String>,
    pub record_count: u64,
}

// ==========================================
// ResearchDelta - 研究元数据变更
// ==========================================
// 仅包含新增或取值发生变化的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchDelta {
    pub name: String,
    pub fields: Vec<Field>,
}

// ==========================================
// QuantityContainerRecord - 量容器记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityContainerRecord {
    pub series_index: u32,
    pub quantity_index: u32,
    /// 按参数缩写升序排列的参数取值索引
    pub parameter_value_indices: Vec<u32>,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_value_index_is_one_based() {
        let mut def = ParameterDefinition::new("Voltage", 2, ValueType::Int32);
        def.values.push(Value::Int32(10));
        def.values.push(Value::Int32(20));
        assert_eq!(def.value_index(&Value::Int32(20)), Some(2));
        assert_eq!(def.value_index(&Value::Int32(30)), None);
        assert_eq!(def.label(), "P_2");
    }

    #[test]
    fn test_quantity_label() {
        let def = QuantityDefinition::new("Power", 4, ValueType::Double);
        assert_eq!(def.label(), "Q_4");
        assert_eq!(def.abbreviation, def.index);
    }

    #[test]
    fn test_constant_field() {
        let mut field = Field::new("Temp", ValueType::Double);
        assert!(!field.is_constant());
        field.values.push(Value::Double(25.0));
        assert!(field.is_constant());
        field.values.push(Value::Double(25.0));
        assert!(field.is_constant());
        field.values.push(Value::Double(26.0));
        assert!(!field.is_constant());
    }
}
