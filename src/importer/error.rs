// ==========================================
// 表格批量导入管道 - 导入错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 配置(致命) / 文件 / 映射 / 远程请求 / 流程状态
// ==========================================

use thiserror::Error;

/// 导入错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 配置错误（致命，终止会话） =====
    #[error("配置错误: {0}")]
    Configuration(String),

    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（支持 .csv/.tsv/.txt/.xlsx/.xlsm/.xls/.ods）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileRead(String),

    #[error("文件无数据行: {0}")]
    EmptyFile(String),

    #[error("文件解析失败: {0}")]
    Parse(String),

    // ===== 映射错误 =====
    #[error("未知字段: {0}")]
    UnknownField(String),

    #[error("文件中不存在列: {0}")]
    UnknownColumn(String),

    #[error("必填字段未映射: {}", missing.join(", "))]
    MappingIncomplete { missing: Vec<String> },

    // ===== 远程请求错误 =====
    #[error("校验请求失败: {0}")]
    ValidationRequest(String),

    #[error("提交请求失败: {0}")]
    CommitRequest(String),

    // ===== 流程状态错误 =====
    #[error("没有可提交的有效行")]
    NothingToCommit,

    #[error("存在 {0} 条无效行，当前配置要求全部通过后才能提交")]
    InvalidRowsPresent(usize),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("已有请求在处理中，请等待完成")]
    RequestInFlight,

    #[error("导入会话已取消")]
    Cancelled,

    // ===== 本地落库错误 =====
    #[error("数据库操作失败: {0}")]
    Database(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否可恢复（配置错误与会话取消之外都允许操作员重试）
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ImportError::Configuration(_) | ImportError::Cancelled)
    }

    /// 错误分类标识（供前端/CLI 展示）
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Configuration(_) => "CONFIGURATION",
            ImportError::UnsupportedFormat(_) | ImportError::FileRead(_) | ImportError::Parse(_) => {
                "PARSE"
            }
            ImportError::EmptyFile(_) => "EMPTY_FILE",
            ImportError::UnknownField(_)
            | ImportError::UnknownColumn(_)
            | ImportError::MappingIncomplete { .. } => "MAPPING",
            ImportError::ValidationRequest(_) => "VALIDATION_REQUEST",
            ImportError::CommitRequest(_) => "COMMIT_REQUEST",
            ImportError::NothingToCommit | ImportError::InvalidRowsPresent(_) => "COMMIT_BLOCKED",
            ImportError::InvalidStateTransition { .. } | ImportError::RequestInFlight => "STATE",
            ImportError::Cancelled => "CANCELLED",
            ImportError::Database(_) => "DATABASE",
            ImportError::Other(_) => "INTERNAL",
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileRead(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Parse(format!("CSV: {}", err))
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::Parse(format!("工作簿: {}", err))
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Other(anyhow::Error::new(err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
