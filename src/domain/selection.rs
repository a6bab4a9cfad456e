// ==========================================
// 参数化数据导入 - 选区描述
// ==========================================
// 职责: 描述一张表上的一个矩形区域（外部预先录入并持久化）
// 坐标: 行列均为 1 基、闭区间；第 1 行/列即表头所在行/列
// ==========================================

use crate::domain::types::{HeaderOrientation, ValueType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRange {
    /// 录入路径，如 "Base/Research/Series/Parameter/RangeName"
    pub path: String,
    pub table_name: String,
    pub header_orientation: HeaderOrientation,
    pub top_row: u32,
    pub bottom_row: u32,
    pub left_column: u32,
    pub right_column: u32,
    pub select_entire_row: bool,
    pub select_entire_column: bool,
    /// 声明类型优先于自动推断
    pub declared_type: ValueType,
    pub decimal_delimiter: char,
}

impl SelectionRange {
    /// 创建一个覆盖 A1 单格的水平选区，其余字段取默认值
    pub fn new(path: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table_name: table_name.into(),
            header_orientation: HeaderOrientation::Horizontal,
            top_row: 1,
            bottom_row: 1,
            left_column: 1,
            right_column: 1,
            select_entire_row: false,
            select_entire_column: false,
            declared_type: ValueType::String,
            decimal_delimiter: '.',
        }
    }

    pub fn with_rows(mut self, top_row: u32, bottom_row: u32) -> Self {
        self.top_row = top_row;
        self.bottom_row = bottom_row;
        self
    }

    pub fn with_columns(mut self, left_column: u32, right_column: u32) -> Self {
        self.left_column = left_column;
        self.right_column = right_column;
        self
    }

    pub fn with_type(mut self, declared_type: ValueType) -> Self {
        self.declared_type = declared_type;
        self
    }

    pub fn with_orientation(mut self, orientation: HeaderOrientation) -> Self {
        self.header_orientation = orientation;
        self
    }

    pub fn entire_column(mut self) -> Self {
        self.select_entire_column = true;
        self
    }

    pub fn entire_row(mut self) -> Self {
        self.select_entire_row = true;
        self
    }

    pub fn with_decimal_delimiter(mut self, delimiter: char) -> Self {
        self.decimal_delimiter = delimiter;
        self
    }

    /// 路径最后一段（选区自身名称）
    pub fn range_name(&self, separator: &str) -> &str {
        match self.path.rfind(separator) {
            Some(pos) => &self.path[pos + separator.len()..],
            None => &self.path,
        }
    }

    /// 去掉最后一段后的分类路径；无分隔符时返回 None
    pub fn category_path(&self, separator: &str) -> Option<&str> {
        self.path.rfind(separator).map(|pos| &self.path[..pos])
    }
}
