// ==========================================
// 参数化数据导入 - 索引管理器
// ==========================================
// 职责: 回放已持久化的序列/参数/量定义，为本次运行分配新索引
// 规则:
// - 参数名与值类型终身绑定，类型重定义为运行级错误
// - 参数取值索引 1 基、只追加；相同取值永远得到相同索引
// - 参数缩写与量索引取当前未占用的最小正整数（回收空位）
// - 序列索引 = 已有最大值 + 1
// 生命周期: 每次运行构造一次，运行结束后由编排器取出增量持久化
// ==========================================

use crate::domain::metadata::{ExistingSeries, ParameterDefinition, QuantityDefinition};
use crate::domain::types::ValueType;
use crate::domain::value::Value;
use crate::importer::error::{ImportError, ImportResult, SeriesValidationError};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone)]
struct ParameterEntry {
    definition: ParameterDefinition,
    lookup: BTreeMap<Value, u32>,
    /// 已持久化的取值个数（新参数为 None）
    persisted_values: Option<usize>,
}

impl ParameterEntry {
    fn new(definition: ParameterDefinition, persisted: bool) -> Self {
        let lookup = definition
            .values
            .iter()
            .enumerate()
            .map(|(pos, v)| (v.clone(), pos as u32 + 1))
            .collect();
        let persisted_values = persisted.then(|| definition.values.len());
        Self {
            definition,
            lookup,
            persisted_values,
        }
    }

    fn is_dirty(&self) -> bool {
        match self.persisted_values {
            Some(count) => count != self.definition.values.len(),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    processed: BTreeSet<String>,
    next_series_index: u32,
    parameters: BTreeMap<String, ParameterEntry>,
    quantities: BTreeMap<String, QuantityDefinition>,
    new_quantities: BTreeSet<String>,
}

impl IndexManager {
    /// 回放已有序列
    ///
    /// # 返回
    /// - Err(ParameterTypeRedefinition): 已持久化数据中同名参数类型不一致
    pub fn from_existing(existing: &[ExistingSeries]) -> ImportResult<Self> {
        let mut manager = Self {
            next_series_index: 1,
            ..Self::default()
        };

        for series in existing {
            manager.processed.insert(series.name.clone());
            manager.next_series_index = manager.next_series_index.max(series.index + 1);

            for parameter in &series.parameters {
                let replace = match manager.parameters.get(&parameter.name) {
                    Some(known) if known.definition.value_type != parameter.value_type => {
                        return Err(ImportError::ParameterTypeRedefinition {
                            parameter: parameter.name.clone(),
                            existing: known.definition.value_type,
                            requested: parameter.value_type,
                        });
                    }
                    // 多个序列引用同一参数，取取值最全的一份
                    Some(known) => known.definition.values.len() < parameter.values.len(),
                    None => true,
                };
                if replace {
                    manager
                        .parameters
                        .insert(parameter.name.clone(), ParameterEntry::new(parameter.clone(), true));
                }
            }

            for quantity in &series.quantities {
                manager
                    .quantities
                    .entry(quantity.name.clone())
                    .or_insert_with(|| quantity.clone());
            }
        }

        debug!(
            series = manager.processed.len(),
            parameters = manager.parameters.len(),
            quantities = manager.quantities.len(),
            "索引状态回放完成"
        );
        Ok(manager)
    }

    pub fn already_processed(&self, series_name: &str) -> bool {
        self.processed.contains(series_name)
    }

    /// 登记新序列并分配序列索引
    pub fn register_series(&mut self, series_name: &str) -> u32 {
        let index = self.next_series_index;
        self.next_series_index += 1;
        self.processed.insert(series_name.to_string());
        index
    }

    // ===== 参数 =====

    /// 检查参数类型是否与已有定义一致（不修改状态）
    pub fn ensure_parameter_type(&self, name: &str, requested: ValueType) -> ImportResult<()> {
        match self.parameters.get(name) {
            Some(entry) if entry.definition.value_type != requested => {
                Err(ImportError::ParameterTypeRedefinition {
                    parameter: name.to_string(),
                    existing: entry.definition.value_type,
                    requested,
                })
            }
            _ => Ok(()),
        }
    }

    /// 为参数取值分配索引
    ///
    /// # 参数
    /// - name: 参数名（首次出现时创建定义并分配缩写）
    /// - value_type: 声明类型
    /// - value: 取值
    ///
    /// # 返回
    /// - Ok(u32): 1 基取值索引；相同取值重复提交返回相同索引
    /// - Err(ParameterTypeRedefinition): 参数已以其他类型定义
    pub fn assign_parameter_value_index(
        &mut self,
        name: &str,
        value_type: ValueType,
        value: &Value,
    ) -> ImportResult<u32> {
        self.ensure_parameter_type(name, value_type)?;

        if !self.parameters.contains_key(name) {
            let abbreviation = lowest_free(self.parameters.values().map(|e| e.definition.abbreviation));
            debug!(parameter = %name, abbreviation = abbreviation, "新建参数定义");
            self.parameters.insert(
                name.to_string(),
                ParameterEntry::new(ParameterDefinition::new(name, abbreviation, value_type), false),
            );
        }

        let entry = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| ImportError::InternalError(format!("参数 {} 未登记", name)))?;

        if let Some(index) = entry.lookup.get(value) {
            return Ok(*index);
        }
        if value.value_type() != value_type {
            return Err(ImportError::ParameterTypeRedefinition {
                parameter: name.to_string(),
                existing: value_type,
                requested: value.value_type(),
            });
        }

        entry.definition.values.push(value.clone());
        let index = entry.definition.values.len() as u32;
        entry.lookup.insert(value.clone(), index);
        Ok(index)
    }

    /// 补充参数单位（已有单位不覆盖）
    pub fn set_parameter_unit(&mut self, name: &str, unit: Option<&str>) {
        if let (Some(entry), Some(unit)) = (self.parameters.get_mut(name), unit) {
            if entry.definition.unit.is_none() {
                entry.definition.unit = Some(unit.to_string());
            }
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.get(name).map(|e| &e.definition)
    }

    // ===== 量 =====

    /// 检查量类型是否与已有定义一致（不修改状态）
    pub fn ensure_quantity_type(
        &self,
        name: &str,
        declared: ValueType,
    ) -> Result<(), SeriesValidationError> {
        match self.quantities.get(name) {
            Some(existing) if existing.value_type != declared => {
                Err(SeriesValidationError::QuantityTypeMismatch {
                    quantity: name.to_string(),
                    existing: existing.value_type,
                    declared,
                })
            }
            _ => Ok(()),
        }
    }

    /// 同名量复用索引，否则取最小空闲正整数
    pub fn assign_or_reuse_quantity_index(
        &mut self,
        name: &str,
        value_type: ValueType,
        unit: Option<&str>,
    ) -> Result<u32, SeriesValidationError> {
        self.ensure_quantity_type(name, value_type)?;
        if let Some(existing) = self.quantities.get(name) {
            return Ok(existing.index);
        }

        let index = lowest_free(self.quantities.values().map(|q| q.index));
        let mut definition = QuantityDefinition::new(name, index, value_type);
        definition.unit = unit.map(str::to_string);
        if index <= self.quantities.len() as u32 {
            debug!(quantity = %name, index = index, "复用空闲量索引");
        }
        self.quantities.insert(name.to_string(), definition);
        self.new_quantities.insert(name.to_string());
        Ok(index)
    }

    pub fn quantity(&self, name: &str) -> Option<&QuantityDefinition> {
        self.quantities.get(name)
    }

    // ===== 增量 =====

    /// 新建或新增了取值的参数定义
    pub fn dirty_parameters(&self) -> Vec<ParameterDefinition> {
        self.parameters
            .values()
            .filter(|e| e.is_dirty())
            .map(|e| e.definition.clone())
            .collect()
    }

    /// 本次运行新建的量定义
    pub fn new_quantities(&self) -> Vec<QuantityDefinition> {
        self.new_quantities
            .iter()
            .filter_map(|name| self.quantities.get(name).cloned())
            .collect()
    }
}

/// 最小未占用正整数
fn lowest_free(used: impl Iterator<Item = u32>) -> u32 {
    let used: BTreeSet<u32> = used.collect();
    let mut candidate = 1;
    for index in used {
        if index == candidate {
            candidate += 1;
        } else if index > candidate {
            break;
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing_series(name: &str, index: u32, quantity_indices: &[(&str, u32)]) -> ExistingSeries {
        let mut voltage = ParameterDefinition::new("Voltage", 1, ValueType::Double);
        voltage.values = vec![Value::Double(1.0), Value::Double(2.0)];
        ExistingSeries {
            name: name.to_string(),
            index,
            parameters: vec![voltage],
            quantities: quantity_indices
                .iter()
                .map(|(n, i)| QuantityDefinition::new(*n, *i, ValueType::Double))
                .collect(),
        }
    }

    #[test]
    fn test_lowest_free() {
        assert_eq!(lowest_free([].into_iter()), 1);
        assert_eq!(lowest_free([1, 2, 3].into_iter()), 4);
        assert_eq!(lowest_free([1, 3, 4].into_iter()), 2);
        assert_eq!(lowest_free([2, 5].into_iter()), 1);
    }

    #[test]
    fn test_value_index_is_stable_and_deduplicated() {
        let mut manager = IndexManager::from_existing(&[]).unwrap();
        let submitted = [3, 1, 3, 2, 1, 3];
        let indices: Vec<u32> = submitted
            .iter()
            .map(|v| {
                manager
                    .assign_parameter_value_index("Step", ValueType::Int32, &Value::Int32(*v))
                    .unwrap()
            })
            .collect();

        assert_eq!(indices, vec![1, 2, 1, 3, 2, 1]);
        assert_eq!(manager.parameter("Step").unwrap().values.len(), 3);
    }

    #[test]
    fn test_replay_keeps_existing_indices() {
        let manager_state = [existing_series("Dataset/S1", 1, &[("Power", 1)])];
        let mut manager = IndexManager::from_existing(&manager_state).unwrap();

        assert!(manager.already_processed("Dataset/S1"));
        assert!(!manager.already_processed("Dataset/S2"));
        assert_eq!(
            manager
                .assign_parameter_value_index("Voltage", ValueType::Double, &Value::Double(2.0))
                .unwrap(),
            2
        );
        assert!(manager.dirty_parameters().is_empty());
        assert_eq!(
            manager
                .assign_parameter_value_index("Voltage", ValueType::Double, &Value::Double(9.0))
                .unwrap(),
            3
        );
        assert_eq!(manager.dirty_parameters().len(), 1);
        assert_eq!(manager.register_series("Dataset/S2"), 2);
    }

    #[test]
    fn test_type_redefinition_is_fatal() {
        let state = [existing_series("Dataset/S1", 1, &[])];
        let mut manager = IndexManager::from_existing(&state).unwrap();
        let err = manager
            .assign_parameter_value_index("Voltage", ValueType::Int32, &Value::Int32(1))
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::ParameterTypeRedefinition {
                existing: ValueType::Double,
                requested: ValueType::Int32,
                ..
            }
        ));
        assert!(manager.ensure_parameter_type("Voltage", ValueType::Double).is_ok());
    }

    #[test]
    fn test_quantity_index_recycling() {
        // 索引 2 对应的序列已被删除
        let state = [
            existing_series("Dataset/S1", 1, &[("Power", 1)]),
            existing_series("Dataset/S3", 3, &[("Energy", 3)]),
        ];
        let mut manager = IndexManager::from_existing(&state).unwrap();

        assert_eq!(
            manager
                .assign_or_reuse_quantity_index("Power", ValueType::Double, None)
                .unwrap(),
            1
        );
        assert_eq!(
            manager
                .assign_or_reuse_quantity_index("Current", ValueType::Double, Some("A"))
                .unwrap(),
            2
        );
        assert_eq!(
            manager
                .assign_or_reuse_quantity_index("Heat", ValueType::Double, None)
                .unwrap(),
            4
        );
        let created: Vec<String> = manager.new_quantities().into_iter().map(|q| q.name).collect();
        assert_eq!(created, vec!["Current".to_string(), "Heat".to_string()]);
        assert_eq!(manager.quantity("Current").unwrap().unit.as_deref(), Some("A"));
        assert_eq!(manager.register_series("Dataset/S4"), 4);
    }

    #[test]
    fn test_quantity_type_mismatch() {
        let state = [existing_series("Dataset/S1", 1, &[("Power", 1)])];
        let mut manager = IndexManager::from_existing(&state).unwrap();
        assert_eq!(
            manager.assign_or_reuse_quantity_index("Power", ValueType::Int64, None),
            Err(SeriesValidationError::QuantityTypeMismatch {
                quantity: "Power".to_string(),
                existing: ValueType::Double,
                declared: ValueType::Int64,
            })
        );
    }

    #[test]
    fn test_parameter_abbreviation_reuses_gap() {
        let mut a = ParameterDefinition::new("A", 1, ValueType::Int32);
        a.values.push(Value::Int32(1));
        let mut c = ParameterDefinition::new("C", 3, ValueType::Int32);
        c.values.push(Value::Int32(1));
        let state = [ExistingSeries {
            name: "Dataset/S1".to_string(),
            index: 1,
            parameters: vec![a, c],
            quantities: Vec::new(),
        }];
        let mut manager = IndexManager::from_existing(&state).unwrap();
        manager
            .assign_parameter_value_index("B", ValueType::Int32, &Value::Int32(7))
            .unwrap();
        assert_eq!(manager.parameter("B").unwrap().abbreviation, 2);
        manager.set_parameter_unit("B", Some("mm"));
        manager.set_parameter_unit("B", Some("cm"));
        assert_eq!(manager.parameter("B").unwrap().unit.as_deref(), Some("mm"));
    }
}
