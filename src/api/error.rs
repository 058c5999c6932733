// ==========================================
// 表格批量导入管道 - API 层错误
// ==========================================
// 职责: 将 ImportError 转换为操作员可读的消息（分类 + 文案 + 是否可重试）
// ==========================================

use crate::importer::error::ImportError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 面向操作员的错误消息
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{kind}] {message}")]
pub struct OperatorMessage {
    /// 错误分类（CONFIGURATION / PARSE / MAPPING / ...）
    pub kind: String,
    /// 展示文案
    pub message: String,
    /// 是否允许在当前会话内重试
    pub retryable: bool,
}

impl From<ImportError> for OperatorMessage {
    fn from(err: ImportError) -> Self {
        let message = match &err {
            ImportError::EmptyFile(_) | ImportError::Parse(_) | ImportError::FileRead(_) => {
                format!("{}，请检查文件后重新上传", err)
            }
            ImportError::ValidationRequest(_) => format!("{}，已返回映射步骤，可重试校验", err),
            ImportError::CommitRequest(_) => {
                format!("{}，本次未导入任何记录，有效行已保留，可重试提交", err)
            }
            _ => err.to_string(),
        };
        Self {
            kind: err.kind().to_string(),
            message,
            retryable: err.is_recoverable(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, OperatorMessage>;
