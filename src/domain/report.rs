// ==========================================
// 参数化数据导入 - 诊断与导入报告
// ==========================================
// 职责: Diagnostics 显式传递并由编排器合并；ImportReport 为一次运行的最终产物
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Diagnostics - 诊断信息集合
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push(message.into());
    }

    /// 追加另一份诊断（保持顺序）
    pub fn merge(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, entry) in self.entries.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

// ==========================================
// SkippedSeries - 被跳过的序列及原因
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSeries {
    pub name: String,
    pub reason: String,
}

// ==========================================
// ImportReport - 导入报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub report_id: String,
    pub scope: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub series_created: Vec<String>,
    pub series_skipped: Vec<SkippedSeries>,
    /// 无法归类的选区路径
    pub unclassified_ranges: Vec<String>,
    pub research_updated: bool,
    pub records_written: u64,
    pub fatal_error: Option<String>,
    pub diagnostics: Diagnostics,
}

impl ImportReport {
    pub fn new(report_id: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            report_id: report_id.into(),
            scope: scope.into(),
            started_at: Utc::now(),
            finished_at: None,
            series_created: Vec::new(),
            series_skipped: Vec::new(),
            unclassified_ranges: Vec::new(),
            research_updated: false,
            records_written: 0,
            fatal_error: None,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn skip(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.series_skipped.push(SkippedSeries {
            name: name.into(),
            reason: reason.into(),
        });
    }

    pub fn skipped_reason(&self, name: &str) -> Option<&str> {
        self.series_skipped
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.reason.as_str())
    }

    /// 本次运行是否产生了需要持久化的内容
    pub fn has_changes(&self) -> bool {
        !self.series_created.is_empty() || self.research_updated
    }

    pub fn is_success(&self) -> bool {
        self.fatal_error.is_none()
    }
}
