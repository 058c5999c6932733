// ==========================================
// 表格批量导入管道 - 领域模型层
// ==========================================
// 职责: 导入目标模式、行记录、校验/提交结果
// 红线: 不含 IO，不含流程逻辑
// ==========================================

pub mod outcome;
pub mod record;
pub mod schema;

// 重导出核心类型
pub use outcome::{CommitOutcome, InvalidRow, RowFailure, ValidationOutcome};
pub use record::{CanonicalRecord, ParsedSheet, RawRow};
pub use schema::{FieldType, ImportField, ImportTarget};
