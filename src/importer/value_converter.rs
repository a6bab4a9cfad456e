// ==========================================
// 参数化数据导入 - 单元格值转换
// ==========================================
// 职责: 原始文本 → 声明类型的 Value
// 规则:
// - 去除首尾空白；空单元格取该类型零值
// - 小数分隔符显式传入，替换为 '.' 后解析（不依赖进程 locale）
// - 分隔符不是 '.' 时，数值文本中出现 '.' 视为转换失败
// - 整数严格解析；浮点必须有限；Float 不得超出 f32 范围
// ==========================================

use crate::domain::types::ValueType;
use crate::domain::value::Value;
use std::fmt;

/// 单个单元格转换失败
#[derive(Debug, Clone, PartialEq)]
pub struct CastFailure {
    pub raw: String,
    pub target: ValueType,
}

impl fmt::Display for CastFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" 无法转换为 {}", self.raw, self.target)
    }
}

/// 将原始文本转换为声明类型
///
/// # 参数
/// - raw: 单元格原始文本
/// - target: 声明类型
/// - decimal_delimiter: 小数分隔符
pub fn convert_cell(raw: &str, target: ValueType, decimal_delimiter: char) -> Result<Value, CastFailure> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(Value::zero(target));
    }

    let failure = || CastFailure {
        raw: raw.to_string(),
        target,
    };

    if target == ValueType::String {
        return Ok(Value::String(text.to_string()));
    }
    let normalized = normalize_decimal(text, decimal_delimiter).ok_or_else(failure)?;
    match target {
        ValueType::String => Ok(Value::String(text.to_string())),
        ValueType::Int32 => normalized.parse::<i32>().map(Value::Int32).map_err(|_| failure()),
        ValueType::Int64 => normalized.parse::<i64>().map(Value::Int64).map_err(|_| failure()),
        ValueType::Double => match normalized.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Value::Double(v)),
            _ => Err(failure()),
        },
        ValueType::Float => match normalized.parse::<f64>() {
            Ok(v) if v.is_finite() && v.abs() <= f32::MAX as f64 => Ok(Value::Float(v as f32)),
            _ => Err(failure()),
        },
    }
}

/// 小数分隔符归一化为 '.'
///
/// 分隔符不是 '.' 而文本含 '.' 时返回 None
fn normalize_decimal(text: &str, decimal_delimiter: char) -> Option<String> {
    if decimal_delimiter == '.' {
        Some(text.to_string())
    } else if text.contains('.') {
        None
    } else {
        Some(text.replace(decimal_delimiter, "."))
    }
}
