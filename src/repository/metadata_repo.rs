// ==========================================
// 参数化数据导入 - 元数据存储 Trait
// ==========================================
// 职责: 定义序列/参数/量/研究元数据与导入报告的存取接口
// 红线: 存储层不含业务规则（索引分配、差异比较均在上层完成）
// ==========================================

use crate::domain::metadata::{
    ExistingSeries, Field, NewSeries, ParameterDefinition, QuantityDefinition, ResearchDelta,
};
use crate::domain::report::ImportReport;
use crate::repository::error::RepositoryResult;

// ==========================================
// MetadataStore Trait
// ==========================================
// 实现者: MetadataRepository（rusqlite）/ 测试中的内存实现
pub trait MetadataStore: Send + Sync {
    /// 列出作用域内已持久化的全部序列（含其引用的参数与量定义）
    ///
    /// # 返回
    /// - 按序列索引升序排列
    fn list_existing_series(&self, scope: &str) -> RepositoryResult<Vec<ExistingSeries>>;

    /// 读取已持久化的研究元数据字段
    fn load_research_fields(&self, scope: &str) -> RepositoryResult<Vec<Field>>;

    /// 一次调用持久化本次运行的全部元数据增量
    ///
    /// # 参数
    /// - series: 新建序列
    /// - parameters: 新建或新增取值的参数定义（整份覆盖）
    /// - quantities: 新建的量定义
    /// - research: 研究元数据增量（无变化时为 None）
    ///
    /// # 返回
    /// - Err: 存储错误（整个事务回滚）
    fn persist_series(
        &self,
        scope: &str,
        series: &[NewSeries],
        parameters: &[ParameterDefinition],
        quantities: &[QuantityDefinition],
        research: Option<&ResearchDelta>,
    ) -> RepositoryResult<()>;

    /// 保存导入报告
    fn save_import_report(&self, report: &ImportReport) -> RepositoryResult<()>;

    /// 按 ID 读取导入报告
    fn get_import_report(&self, report_id: &str) -> RepositoryResult<Option<ImportReport>>;
}
