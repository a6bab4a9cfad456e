// ==========================================
// 参数化数据导入 - 一致性校验器
// ==========================================
// 职责: 对单个 Series 做纯校验（不修改任何状态）
// 顺序:
// 1. Series 同时具备 Parameter 与 Quantity 分类
// 2. Parameter 与 Quantity 的选区只引用一张表
// 3. 两组字段各自只有一种行数，且两者相等
//    （只有一个取值的参数字段视为常量，不参与行数比较）
// 任一失败只跳过当前 Series
// ==========================================

use crate::domain::category::{AssemblyId, CategoryGraph};
use crate::domain::metadata::Field;
use crate::domain::types::CategoryKind;
use crate::importer::error::SeriesValidationError;
use std::collections::BTreeSet;

/// 校验 1 通过后得到的链路
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesChain {
    pub series: AssemblyId,
    pub parameter: AssemblyId,
    pub quantity: AssemblyId,
}

pub struct ConsistencyChecker;

impl ConsistencyChecker {
    /// 校验 1: Series 同时具备 Parameter 与 Quantity 分类，且两者均有选区
    pub fn all_series_have_parameter_and_quantity(
        graph: &CategoryGraph,
        series: AssemblyId,
    ) -> Result<SeriesChain, SeriesValidationError> {
        let missing = |kind| SeriesValidationError::MissingContinuation { missing: kind };

        let parameter = graph
            .parameter_of(series)
            .filter(|id| graph.get(*id).map_or(false, |a| !a.ranges.is_empty()))
            .ok_or_else(|| missing(CategoryKind::Parameter))?;
        let quantity = graph
            .quantity_of(series)
            .filter(|id| graph.get(*id).map_or(false, |a| !a.ranges.is_empty()))
            .ok_or_else(|| missing(CategoryKind::Quantity))?;

        Ok(SeriesChain {
            series,
            parameter,
            quantity,
        })
    }

    /// 校验 2: Parameter 与 Quantity 选区引用的表名集合恰好一个元素
    ///
    /// # 返回
    /// - Ok(String): 唯一的表名
    pub fn parameter_and_quantity_share_one_table(
        graph: &CategoryGraph,
        chain: &SeriesChain,
    ) -> Result<String, SeriesValidationError> {
        let mut tables: BTreeSet<String> = BTreeSet::new();
        for id in [chain.parameter, chain.quantity] {
            if let Some(assembly) = graph.get(id) {
                tables.extend(assembly.table_names().into_iter().map(str::to_string));
            }
        }

        let mut names = tables.iter();
        match (names.next(), names.next()) {
            (Some(only), None) => Ok(only.clone()),
            _ => Err(SeriesValidationError::MultipleTables {
                tables: tables.iter().cloned().collect(),
            }),
        }
    }

    /// 校验 3: 两组各自只有一种行数且相等
    ///
    /// 只有一个取值的参数字段为常量，写出时对每一行生效，不参与比较
    ///
    /// # 返回
    /// - Ok(usize): 公共行数
    /// - Err(RowCountMismatch): 附带两组每个字段的行数
    pub fn parameter_and_quantity_counts_match(
        parameter_fields: &[Field],
        quantity_fields: &[Field],
    ) -> Result<usize, SeriesValidationError> {
        let quantity_counts: BTreeSet<usize> = quantity_fields.iter().map(Field::len).collect();
        let mut counts = quantity_counts.iter();

        if let (Some(&rows), None) = (counts.next(), counts.next()) {
            let parameters_fit = parameter_fields
                .iter()
                .all(|f| f.len() == rows || f.len() == 1);
            if !parameter_fields.is_empty() && parameters_fit {
                return Ok(rows);
            }
        }

        Err(SeriesValidationError::RowCountMismatch {
            parameter_sizes: sizes(parameter_fields),
            quantity_sizes: sizes(quantity_fields),
        })
    }
}

fn sizes(fields: &[Field]) -> Vec<(String, usize)> {
    fields.iter().map(|f| (f.name.clone(), f.len())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::selection::SelectionRange;
    use crate::domain::types::ValueType;
    use crate::domain::value::Value;

    fn field(name: &str, len: usize) -> Field {
        let mut f = Field::new(name, ValueType::Int32);
        f.values = (0..len as i32).map(Value::Int32).collect();
        f
    }

    fn graph_with(param_tables: &[&str], quantity_tables: &[&str]) -> (CategoryGraph, AssemblyId) {
        let mut graph = CategoryGraph::new();
        let s = graph.insert_or_get("B/R/S", CategoryKind::Series);
        if !param_tables.is_empty() || !quantity_tables.is_empty() {
            let p = graph.insert_or_get("B/R/S/Parameter", CategoryKind::Parameter);
            graph.link(s, p);
            for t in param_tables {
                graph.get_mut(p).unwrap().ranges.push(SelectionRange::new("B/R/S/Parameter/x", *t));
            }
            if !quantity_tables.is_empty() {
                let q = graph.insert_or_get("B/R/S/Quantity", CategoryKind::Quantity);
                graph.link(p, q);
                for t in quantity_tables {
                    graph.get_mut(q).unwrap().ranges.push(SelectionRange::new("B/R/S/Quantity/y", *t));
                }
            }
        }
        (graph, s)
    }

    #[test]
    fn test_missing_continuations() {
        let (graph, s) = graph_with(&[], &[]);
        assert_eq!(
            ConsistencyChecker::all_series_have_parameter_and_quantity(&graph, s),
            Err(SeriesValidationError::MissingContinuation {
                missing: CategoryKind::Parameter
            })
        );

        let (graph, s) = graph_with(&["T"], &[]);
        assert_eq!(
            ConsistencyChecker::all_series_have_parameter_and_quantity(&graph, s),
            Err(SeriesValidationError::MissingContinuation {
                missing: CategoryKind::Quantity
            })
        );

        // 空 Parameter（分类器补出的占位节点）视为缺失
        let (graph, s) = graph_with(&[], &["T"]);
        assert!(matches!(
            ConsistencyChecker::all_series_have_parameter_and_quantity(&graph, s),
            Err(SeriesValidationError::MissingContinuation {
                missing: CategoryKind::Parameter
            })
        ));
    }

    #[test]
    fn test_single_table_rule() {
        let (graph, s) = graph_with(&["T", "T"], &["T"]);
        let chain = ConsistencyChecker::all_series_have_parameter_and_quantity(&graph, s).unwrap();
        assert_eq!(
            ConsistencyChecker::parameter_and_quantity_share_one_table(&graph, &chain),
            Ok("T".to_string())
        );

        let (graph, s) = graph_with(&["T"], &["U"]);
        let chain = ConsistencyChecker::all_series_have_parameter_and_quantity(&graph, s).unwrap();
        assert_eq!(
            ConsistencyChecker::parameter_and_quantity_share_one_table(&graph, &chain),
            Err(SeriesValidationError::MultipleTables {
                tables: vec!["T".to_string(), "U".to_string()]
            })
        );
    }

    #[test]
    fn test_row_count_gate() {
        let params = vec![field("A", 5), field("B", 5), field("C", 5)];
        let quantities = vec![field("X", 5), field("Y", 5)];
        assert_eq!(
            ConsistencyChecker::parameter_and_quantity_counts_match(&params, &quantities),
            Ok(5)
        );

        let short = vec![field("X", 5), field("Y", 4)];
        let err = ConsistencyChecker::parameter_and_quantity_counts_match(&params, &short).unwrap_err();
        match err {
            SeriesValidationError::RowCountMismatch {
                parameter_sizes,
                quantity_sizes,
            } => {
                assert_eq!(parameter_sizes.len(), 3);
                assert_eq!(quantity_sizes, vec![("X".to_string(), 5), ("Y".to_string(), 4)]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_group_counts_must_be_equal_across_groups() {
        let params = vec![field("A", 3)];
        let quantities = vec![field("X", 4)];
        assert!(ConsistencyChecker::parameter_and_quantity_counts_match(&params, &quantities).is_err());
        assert!(ConsistencyChecker::parameter_and_quantity_counts_match(&[], &quantities).is_err());
    }

    #[test]
    fn test_single_value_parameter_is_constant() {
        let params = vec![field("Voltage", 3), field("Temp", 1)];
        let quantities = vec![field("Power", 3)];
        assert_eq!(
            ConsistencyChecker::parameter_and_quantity_counts_match(&params, &quantities),
            Ok(3)
        );

        // 两个取值的字段不是常量
        let params = vec![field("Voltage", 3), field("Temp", 2)];
        assert!(ConsistencyChecker::parameter_and_quantity_counts_match(&params, &quantities).is_err());
    }
}
