// ==========================================
// 参数化数据导入 - 选区抽取器
// ==========================================
// 职责: 按分类节点的选区从表快照中抽取带类型的字段
// 流程: 越界检查（读单元格之前）→ 读表头 → 按位置收集原始文本 → 按声明类型转换
// 坐标:
// - 选区坐标 1 基闭区间，第 1 行（水平）或第 1 列（垂直）为表头
// - 数据区自动跳过表头；整行/整列标志把对应方向扩展到整表（去表头）
// 转换: 全部单元格尝试完毕后才判定失败，失败明细写入 Diagnostics
// 小数分隔符: 选区显式设置优先，否则取表的分隔符
// ==========================================

use crate::config::ImportSettings;
use crate::domain::category::CategoryAssembly;
use crate::domain::metadata::Field;
use crate::domain::report::Diagnostics;
use crate::domain::selection::SelectionRange;
use crate::domain::table::TableSnapshot;
use crate::domain::types::{CategoryKind, HeaderOrientation, ValueType};
use crate::importer::error::SeriesValidationError;
use crate::importer::field_naming::normalize_header;
use crate::importer::value_converter::convert_cell;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// 已加载表（表名 → 快照）
pub type LoadedTables = BTreeMap<String, Arc<TableSnapshot>>;

/// 选区在表上解析后的 0 基坐标
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRange {
    /// 字段所在方向的位置（水平: 列；垂直: 行）
    pub fields: RangeInclusive<usize>,
    /// 取值所在方向的位置（水平: 行；垂直: 列），不含表头
    pub values: RangeInclusive<usize>,
    pub has_values: bool,
}

/// 原始单元格（延迟到字段类型确定后再转换）
#[derive(Debug, Clone)]
struct RawCell {
    raw: String,
    row: usize,
    col: usize,
    decimal_delimiter: char,
}

#[derive(Debug, Default)]
struct FieldAccumulator {
    unit: Option<String>,
    value_type: Option<ValueType>,
    table: String,
    cells: BTreeMap<usize, RawCell>,
}

pub struct RangeExtractor {
    parameter_prefix: String,
    quantity_prefix: String,
}

impl RangeExtractor {
    pub fn new(settings: &ImportSettings) -> Self {
        Self {
            parameter_prefix: settings.parameter_prefix.clone(),
            quantity_prefix: settings.quantity_prefix.clone(),
        }
    }

    /// 解析选区坐标；越界返回 None
    pub fn resolve(range: &SelectionRange, table: &TableSnapshot) -> Option<ResolvedRange> {
        let (rows, cols) = (table.rows(), table.cols());

        // 水平: 字段沿列、取值沿行；垂直相反
        let (field_bounds, field_extent, field_entire, value_bounds, value_extent, value_entire) =
            match range.header_orientation {
                HeaderOrientation::Horizontal => (
                    (range.left_column, range.right_column),
                    cols,
                    range.select_entire_row,
                    (range.top_row, range.bottom_row),
                    rows,
                    range.select_entire_column,
                ),
                HeaderOrientation::Vertical => (
                    (range.top_row, range.bottom_row),
                    rows,
                    range.select_entire_column,
                    (range.left_column, range.right_column),
                    cols,
                    range.select_entire_row,
                ),
            };

        let fields = if field_entire {
            if field_extent == 0 {
                return None;
            }
            0..=field_extent - 1
        } else {
            checked_span(field_bounds, field_extent)?
        };

        let (value_start, value_end) = if value_entire {
            (1, last_data_index(value_extent))
        } else {
            let span = checked_span(value_bounds, value_extent)?;
            ((*span.start()).max(1), *span.end())
        };
        let has_values = value_extent > 1 && value_start <= value_end;

        Some(ResolvedRange {
            fields,
            values: value_start..=value_end,
            has_values,
        })
    }

    /// 读单元格之前的越界检查，列出全部越界选区
    pub fn check_bounds<'a>(
        ranges: impl IntoIterator<Item = &'a SelectionRange>,
        tables: &LoadedTables,
    ) -> Result<(), SeriesValidationError> {
        let mut offending = Vec::new();
        for range in ranges {
            let table = tables.get(&range.table_name).ok_or_else(|| {
                SeriesValidationError::TableUnavailable {
                    table: range.table_name.clone(),
                    message: "表未加载".to_string(),
                }
            })?;
            if Self::resolve(range, table).is_none() {
                offending.push(range.path.clone());
            }
        }

        if offending.is_empty() {
            Ok(())
        } else {
            Err(SeriesValidationError::RangeOutOfBounds { ranges: offending })
        }
    }

    /// 抽取一个分类节点的全部字段
    ///
    /// # 参数
    /// - assembly: 分类节点（其层级决定是否剥离字段名前缀）
    /// - tables: 已加载表
    /// - diagnostics: 转换失败明细追加到此
    ///
    /// # 返回
    /// - Ok(Vec<Field>): 按字段名排序
    /// - Err(RangeOutOfBounds / TableUnavailable / EmptyHeader): 读单元格前即失败
    /// - Err(CastFailures): 全部单元格尝试后存在转换失败
    pub fn extract(
        &self,
        assembly: &CategoryAssembly,
        tables: &LoadedTables,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Field>, SeriesValidationError> {
        Self::check_bounds(&assembly.ranges, tables)?;

        let prefix = match assembly.kind {
            CategoryKind::Parameter => Some(self.parameter_prefix.as_str()),
            CategoryKind::Quantity => Some(self.quantity_prefix.as_str()),
            CategoryKind::Research | CategoryKind::Series => None,
        };

        let mut accumulators: BTreeMap<String, FieldAccumulator> = BTreeMap::new();
        for range in &assembly.ranges {
            let table = tables.get(&range.table_name).ok_or_else(|| {
                SeriesValidationError::TableUnavailable {
                    table: range.table_name.clone(),
                    message: "表未加载".to_string(),
                }
            })?;
            let resolved = Self::resolve(range, table).ok_or_else(|| {
                SeriesValidationError::RangeOutOfBounds {
                    ranges: vec![range.path.clone()],
                }
            })?;
            collect_range(range, table, &resolved, prefix, &mut accumulators)?;
        }

        let mut fields = Vec::with_capacity(accumulators.len());
        let mut failures = 0usize;
        for (name, acc) in accumulators {
            let value_type = acc.value_type.unwrap_or(ValueType::String);
            let mut field = Field::new(name, value_type);
            field.unit = acc.unit;

            for cell in acc.cells.into_values() {
                match convert_cell(&cell.raw, value_type, cell.decimal_delimiter) {
                    Ok(value) => field.values.push(value),
                    Err(failure) => {
                        failures += 1;
                        diagnostics.push(format!(
                            "表 {} 单元格 ({}, {}) 字段 {}: {}",
                            acc.table,
                            cell.row + 1,
                            cell.col + 1,
                            field.name,
                            failure
                        ));
                    }
                }
            }
            fields.push(field);
        }

        if failures > 0 {
            return Err(SeriesValidationError::CastFailures { count: failures });
        }
        Ok(fields)
    }

    /// 只读表头，得到每个字段名及其生效的声明类型（不转换任何取值）
    ///
    /// 空表头跳过，留给 extract 报错
    pub fn declared_headers(
        &self,
        assembly: &CategoryAssembly,
        tables: &LoadedTables,
    ) -> Result<BTreeMap<String, ValueType>, SeriesValidationError> {
        Self::check_bounds(&assembly.ranges, tables)?;
        let prefix = match assembly.kind {
            CategoryKind::Parameter => Some(self.parameter_prefix.as_str()),
            CategoryKind::Quantity => Some(self.quantity_prefix.as_str()),
            CategoryKind::Research | CategoryKind::Series => None,
        };

        let mut headers = BTreeMap::new();
        for range in &assembly.ranges {
            let Some(table) = tables.get(&range.table_name) else {
                continue;
            };
            let Some(resolved) = Self::resolve(range, table) else {
                continue;
            };
            for field_pos in resolved.fields {
                let header = match range.header_orientation {
                    HeaderOrientation::Horizontal => table.cell_at(0, field_pos),
                    HeaderOrientation::Vertical => table.cell_at(field_pos, 0),
                };
                if header.trim().is_empty() {
                    continue;
                }
                let (name, _) = normalize_header(header, prefix);
                headers.insert(name, range.declared_type);
            }
        }
        Ok(headers)
    }
}

/// 1 基闭区间 → 0 基闭区间，越界返回 None
fn checked_span((lo, hi): (u32, u32), extent: usize) -> Option<RangeInclusive<usize>> {
    let (lo, hi) = (lo as usize, hi as usize);
    if lo == 0 || lo > hi || hi > extent {
        return None;
    }
    Some(lo - 1..=hi - 1)
}

/// 整行/整列时取值方向的末位置；空表返回 0（has_values 为 false）
fn last_data_index(extent: usize) -> usize {
    extent.saturating_sub(1)
}

/// 选区保持默认 '.' 时使用表自身的小数分隔符
fn effective_decimal_delimiter(range: &SelectionRange, table: &TableSnapshot) -> char {
    if range.decimal_delimiter == '.' {
        table.decimal_delimiter()
    } else {
        range.decimal_delimiter
    }
}

fn collect_range(
    range: &SelectionRange,
    table: &TableSnapshot,
    resolved: &ResolvedRange,
    prefix: Option<&str>,
    accumulators: &mut BTreeMap<String, FieldAccumulator>,
) -> Result<(), SeriesValidationError> {
    let horizontal = range.header_orientation == HeaderOrientation::Horizontal;
    let decimal_delimiter = effective_decimal_delimiter(range, table);

    for (offset, field_pos) in resolved.fields.clone().enumerate() {
        let header = if horizontal {
            table.cell_at(0, field_pos)
        } else {
            table.cell_at(field_pos, 0)
        };
        if header.trim().is_empty() {
            return Err(SeriesValidationError::EmptyHeader {
                range: range.path.clone(),
                position: offset + 1,
            });
        }

        let (name, unit) = normalize_header(header, prefix);
        let acc = accumulators.entry(name).or_default();
        // 同名字段跨选区时，后出现的声明类型生效
        acc.value_type = Some(range.declared_type);
        acc.table = range.table_name.clone();
        if unit.is_some() {
            acc.unit = unit;
        }

        if !resolved.has_values {
            continue;
        }
        for value_pos in resolved.values.clone() {
            let (row, col) = if horizontal {
                (value_pos, field_pos)
            } else {
                (field_pos, value_pos)
            };
            acc.cells.insert(
                value_pos,
                RawCell {
                    raw: table.cell_at(row, col).to_string(),
                    row,
                    col,
                    decimal_delimiter,
                },
            );
        }
    }
    Ok(())
}
