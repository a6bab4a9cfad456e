// ==========================================
// 参数化数据导入 - 分类图
// ==========================================
// 职责: 分类节点的存储与链路
// 结构: 节点存放于 Vec（arena），以 AssemblyId 下标互相引用
// 链路: Series.next → Parameter，Parameter.next → Quantity
// ==========================================

use crate::domain::selection::SelectionRange;
use crate::domain::types::CategoryKind;
use std::collections::{BTreeMap, BTreeSet};

/// 分类节点在图中的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssemblyId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAssembly {
    pub path: String,
    pub kind: CategoryKind,
    pub ranges: Vec<SelectionRange>,
    /// 链路中的下一个分类
    pub next: Option<AssemblyId>,
}

impl CategoryAssembly {
    pub fn new(path: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            path: path.into(),
            kind,
            ranges: Vec::new(),
            next: None,
        }
    }

    /// 路径最后一段
    pub fn name(&self, separator: &str) -> &str {
        match self.path.rfind(separator) {
            Some(pos) => &self.path[pos + separator.len()..],
            None => &self.path,
        }
    }

    /// 该节点选区引用到的全部表名
    pub fn table_names(&self) -> BTreeSet<&str> {
        self.ranges.iter().map(|r| r.table_name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryGraph {
    assemblies: Vec<CategoryAssembly>,
    by_path: BTreeMap<String, AssemblyId>,
}

impl CategoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }

    pub fn get(&self, id: AssemblyId) -> Option<&CategoryAssembly> {
        self.assemblies.get(id.0)
    }

    pub fn get_mut(&mut self, id: AssemblyId) -> Option<&mut CategoryAssembly> {
        self.assemblies.get_mut(id.0)
    }

    pub fn id_of(&self, path: &str) -> Option<AssemblyId> {
        self.by_path.get(path).copied()
    }

    pub fn get_by_path(&self, path: &str) -> Option<&CategoryAssembly> {
        self.id_of(path).and_then(|id| self.get(id))
    }

    /// 取得路径对应节点，不存在时按给定层级创建
    ///
    /// 已存在节点保持原有层级不变
    pub fn insert_or_get(&mut self, path: &str, kind: CategoryKind) -> AssemblyId {
        if let Some(id) = self.id_of(path) {
            return id;
        }
        let id = AssemblyId(self.assemblies.len());
        self.assemblies.push(CategoryAssembly::new(path, kind));
        self.by_path.insert(path.to_string(), id);
        id
    }

    /// 设置 from → to 链路
    pub fn link(&mut self, from: AssemblyId, to: AssemblyId) {
        if let Some(node) = self.assemblies.get_mut(from.0) {
            node.next = Some(to);
        }
    }

    /// 按路径字典序遍历指定层级的节点
    pub fn ids_of_kind(&self, kind: CategoryKind) -> Vec<AssemblyId> {
        self.by_path
            .values()
            .copied()
            .filter(|id| self.assemblies[id.0].kind == kind)
            .collect()
    }

    /// Series 链路上的 Parameter 节点
    pub fn parameter_of(&self, series: AssemblyId) -> Option<AssemblyId> {
        let next = self.get(series)?.next?;
        match self.get(next)?.kind {
            CategoryKind::Parameter => Some(next),
            _ => None,
        }
    }

    /// Series 链路上的 Quantity 节点
    pub fn quantity_of(&self, series: AssemblyId) -> Option<AssemblyId> {
        let parameter = self.parameter_of(series)?;
        let next = self.get(parameter)?.next?;
        match self.get(next)?.kind {
            CategoryKind::Quantity => Some(next),
            _ => None,
        }
    }

    /// 路径字典序遍历全部节点
    pub fn iter(&self) -> impl Iterator<Item = (AssemblyId, &CategoryAssembly)> {
        self.by_path
            .values()
            .map(move |id| (*id, &self.assemblies[id.0]))
    }

    /// 全部节点持有的选区总数
    pub fn range_count(&self) -> usize {
        self.assemblies.iter().map(|a| a.ranges.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_lookup() {
        let mut graph = CategoryGraph::new();
        let s = graph.insert_or_get("B/R/S", CategoryKind::Series);
        let p = graph.insert_or_get("B/R/S/Parameter", CategoryKind::Parameter);
        let q = graph.insert_or_get("B/R/S/Quantity", CategoryKind::Quantity);
        graph.link(s, p);
        graph.link(p, q);

        assert_eq!(graph.parameter_of(s), Some(p));
        assert_eq!(graph.quantity_of(s), Some(q));
        assert_eq!(graph.get(s).unwrap().name("/"), "S");
    }

    #[test]
    fn test_insert_is_idempotent_and_ordered() {
        let mut graph = CategoryGraph::new();
        let b = graph.insert_or_get("B/R/S2", CategoryKind::Series);
        let a = graph.insert_or_get("B/R/S1", CategoryKind::Series);
        assert_eq!(graph.insert_or_get("B/R/S2", CategoryKind::Research), b);
        assert_eq!(graph.get(b).unwrap().kind, CategoryKind::Series);
        assert_eq!(graph.ids_of_kind(CategoryKind::Series), vec![a, b]);
    }

    #[test]
    fn test_quantity_requires_parameter_in_between() {
        let mut graph = CategoryGraph::new();
        let s = graph.insert_or_get("B/R/S", CategoryKind::Series);
        let q = graph.insert_or_get("B/R/S/Quantity", CategoryKind::Quantity);
        graph.link(s, q);
        assert_eq!(graph.parameter_of(s), None);
        assert_eq!(graph.quantity_of(s), None);
    }
}
