// ==========================================
// 表格批量导入管道 - API 层
// ==========================================
// 职责: 提供面向操作员的导入接口，供 CLI / 上层服务调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod views;

// 重导出核心类型
pub use error::{ApiResult, OperatorMessage};
pub use import_api::{ImportApi, ImportSessionApi};
pub use views::{
    CommitReport, CommitStatus, FieldMappingRow, MappingView, RowErrorPreview, TargetView,
    ValidationSummary,
};
