// ==========================================
// 参数化数据导入 - 进度上报
// ==========================================
// 职责: 定义进度/消息上报 trait，与日志解耦
// 说明: 默认实现转发到 tracing；宿主服务可替换为自己的推送通道
// ==========================================

use tracing::info;

/// 进度上报 Trait
pub trait ProgressSink: Send + Sync {
    /// 上报一条消息
    fn report(&self, message: &str);

    /// 上报进度
    ///
    /// # 参数
    /// - done: 已完成数
    /// - total: 总数
    fn report_progress(&self, done: usize, total: usize);
}

/// 转发到 tracing 的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn report(&self, message: &str) {
        info!(target: "parameterized_import::progress", "{}", message);
    }

    fn report_progress(&self, done: usize, total: usize) {
        info!(target: "parameterized_import::progress", done = done, total = total, "导入进度");
    }
}

/// 空实现（不需要进度时使用）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn report(&self, _message: &str) {}

    fn report_progress(&self, _done: usize, _total: usize) {}
}
