// ==========================================
// 参数化数据导入 - 表快照
// ==========================================
// 职责: 只读字符串矩阵 + 维度 + 小数分隔符
// 说明: 不规则行在构造时补齐为空串，cell_at 越界返回空串
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    name: String,
    cells: Vec<Vec<String>>,
    rows: usize,
    cols: usize,
    decimal_delimiter: char,
}

impl TableSnapshot {
    /// 由行优先矩阵构造快照
    ///
    /// # 参数
    /// - name: 表名
    /// - cells: 行优先的原始文本（含表头行）
    /// - decimal_delimiter: 该表数值使用的小数分隔符
    pub fn new(name: impl Into<String>, mut cells: Vec<Vec<String>>, decimal_delimiter: char) -> Self {
        let cols = cells.iter().map(|row| row.len()).max().unwrap_or(0);
        for row in &mut cells {
            row.resize(cols, String::new());
        }
        let rows = cells.len();

        Self {
            name: name.into(),
            cells,
            rows,
            cols,
            decimal_delimiter,
        }
    }

    /// 便捷构造（测试与内存表源使用）
    pub fn from_rows(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let cells = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        Self::new(name, cells, '.')
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn decimal_delimiter(&self) -> char {
        self.decimal_delimiter
    }

    /// 读取 0 基坐标处的单元格
    pub fn cell_at(&self, row: usize, col: usize) -> &str {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}
