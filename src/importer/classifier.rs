// ==========================================
// 参数化数据导入 - 选区分类器
// ==========================================
// 职责: 将平铺的选区按录入路径归入 Research → Series → Parameter → Quantity 分类图
// 规则:
// - 分类路径 = 选区路径去掉最后一段；深度 = 分类路径中分隔符个数
// - 深度 1 → Research；深度 2 → Series
// - 深度 ≥ 3 且第 4 段为保留目录名 → Parameter / Quantity，所属 Series 按需创建
// - 无 Research 级选区时，以第一个已归类选区路径的前两段生成占位 Research
// - 无法归类的选区进入 unclassified，不丢弃
// ==========================================

use crate::config::ImportSettings;
use crate::domain::category::{AssemblyId, CategoryGraph};
use crate::domain::selection::SelectionRange;
use crate::domain::types::CategoryKind;
use crate::importer::error::{ImportError, ImportResult};
use tracing::{debug, warn};

/// 分类结果
#[derive(Debug, Clone)]
pub struct Classification {
    pub graph: CategoryGraph,
    pub research: AssemblyId,
    pub unclassified: Vec<SelectionRange>,
}

impl Classification {
    /// 按路径字典序排列的 Series
    pub fn series_ids(&self) -> Vec<AssemblyId> {
        self.graph.ids_of_kind(CategoryKind::Series)
    }
}

pub struct Classifier {
    parameter_folder: String,
    quantity_folder: String,
    separator: String,
}

impl Classifier {
    pub fn new(settings: &ImportSettings) -> Self {
        Self {
            parameter_folder: settings.parameter_folder.clone(),
            quantity_folder: settings.quantity_folder.clone(),
            separator: settings.path_separator.clone(),
        }
    }

    /// 构建分类图
    ///
    /// # 返回
    /// - Err(AmbiguousResearchRoot): 存在多个深度为 1 的分类
    /// - Err(MissingResearchRoot): 没有任何可归类的选区
    pub fn classify(&self, ranges: Vec<SelectionRange>) -> ImportResult<Classification> {
        let total = ranges.len();
        let mut graph = CategoryGraph::new();
        let mut unclassified = Vec::new();
        // 占位 Research 的候选路径（第一个已归类选区的前两段）
        let mut first_root: Option<String> = None;

        for range in ranges {
            let segments: Vec<&str> = range.path.split(self.separator.as_str()).collect();
            let placement = self.place(&segments);

            let Some((kind, category_path)) = placement else {
                warn!(path = %range.path, "选区无法归类");
                unclassified.push(range);
                continue;
            };

            if first_root.is_none() {
                first_root = Some(segments[..2].join(&self.separator));
            }

            let id = graph.insert_or_get(&category_path, kind);
            if matches!(kind, CategoryKind::Parameter | CategoryKind::Quantity) {
                // 所属 Series 按需创建
                let series_path = segments[..3].join(&self.separator);
                graph.insert_or_get(&series_path, CategoryKind::Series);
            }

            if let Some(node) = graph.get_mut(id) {
                node.ranges.push(range);
            }
        }

        let research = self.resolve_research(&mut graph, first_root)?;
        self.wire_links(&mut graph);

        debug_assert_eq!(graph.range_count() + unclassified.len(), total);
        debug!(
            assemblies = graph.len(),
            unclassified = unclassified.len(),
            "选区分类完成"
        );

        Ok(Classification {
            graph,
            research,
            unclassified,
        })
    }

    /// 判定选区所属分类层级与分类路径
    fn place(&self, segments: &[&str]) -> Option<(CategoryKind, String)> {
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        // 分类路径的段数 = 全路径段数 - 1；深度 = 分类段数 - 1
        let depth = segments.len().checked_sub(2)?;
        match depth {
            0 => None,
            1 => Some((CategoryKind::Research, segments[..2].join(&self.separator))),
            2 => Some((CategoryKind::Series, segments[..3].join(&self.separator))),
            _ => {
                let folder = segments[3];
                let kind = if folder == self.parameter_folder {
                    CategoryKind::Parameter
                } else if folder == self.quantity_folder {
                    CategoryKind::Quantity
                } else {
                    return None;
                };
                Some((kind, segments[..4].join(&self.separator)))
            }
        }
    }

    fn resolve_research(
        &self,
        graph: &mut CategoryGraph,
        first_root: Option<String>,
    ) -> ImportResult<AssemblyId> {
        let roots = graph.ids_of_kind(CategoryKind::Research);
        match roots.len() {
            1 => Ok(roots[0]),
            0 => {
                let path = first_root.ok_or(ImportError::MissingResearchRoot)?;
                debug!(path = %path, "无 Research 级选区，生成占位 Research");
                Ok(graph.insert_or_get(&path, CategoryKind::Research))
            }
            _ => {
                let paths = roots
                    .iter()
                    .filter_map(|id| graph.get(*id))
                    .map(|a| a.path.clone())
                    .collect();
                Err(ImportError::AmbiguousResearchRoot(paths))
            }
        }
    }

    /// Series → Parameter → Quantity；有 Quantity 无 Parameter 时补空 Parameter 保持链路完整
    fn wire_links(&self, graph: &mut CategoryGraph) {
        for series in graph.ids_of_kind(CategoryKind::Series) {
            let Some(series_path) = graph.get(series).map(|a| a.path.clone()) else {
                continue;
            };
            let parameter_path = format!("{}{}{}", series_path, self.separator, self.parameter_folder);
            let quantity_path = format!("{}{}{}", series_path, self.separator, self.quantity_folder);

            let quantity = graph.id_of(&quantity_path);
            let parameter = match (graph.id_of(&parameter_path), quantity) {
                (Some(p), _) => Some(p),
                (None, Some(_)) => Some(graph.insert_or_get(&parameter_path, CategoryKind::Parameter)),
                (None, None) => None,
            };

            if let Some(p) = parameter {
                graph.link(series, p);
                if let Some(q) = quantity {
                    graph.link(p, q);
                }
            }
        }
    }
}
