// ==========================================
// 参数化数据导入 - API 层
// ==========================================
// 职责: 提供异步导入接口，供宿主服务或 CLI 调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse};
