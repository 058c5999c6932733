// ==========================================
// 表格批量导入管道 - 外部协作方
// ==========================================
// 职责: 校验服务 / 提交服务 接口及实现
// 实现:
// - HTTP: 远端 REST 后端（{success, data?, error?} 信封）
// - 本地: 模式级校验 + SQLite 落库（离线 / 演练）
// ==========================================

pub mod http_client;
pub mod schema_validator;
pub mod sqlite_commit;

use crate::domain::outcome::{CommitOutcome, ValidationOutcome};
use crate::domain::record::CanonicalRecord;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http_client::{HttpCommitService, HttpValidationService};
pub use schema_validator::SchemaValidationService;
pub use sqlite_commit::SqliteCommitService;

// ==========================================
// ValidationService Trait
// ==========================================
// 实现者: HttpValidationService, SchemaValidationService
#[async_trait]
pub trait ValidationService: Send + Sync {
    /// 整批校验，返回 valid / invalid 分区
    ///
    /// # 返回
    /// - Ok(ValidationOutcome): 校验结果
    /// - Err(ValidationRequest): 传输或远端失败
    async fn validate(
        &self,
        target_id: &str,
        rows: &[CanonicalRecord],
    ) -> ImportResult<ValidationOutcome>;
}

// ==========================================
// CommitService Trait
// ==========================================
// 实现者: HttpCommitService, SqliteCommitService
#[async_trait]
pub trait CommitService: Send + Sync {
    /// 提交有效行（允许部分成功）
    ///
    /// # 返回
    /// - Ok(CommitOutcome): 成功/失败计数
    /// - Err(CommitRequest): 传输或远端失败
    async fn commit(&self, target_id: &str, rows: &[CanonicalRecord])
        -> ImportResult<CommitOutcome>;
}

// ==========================================
// 请求 / 响应信封
// ==========================================
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest<'a> {
    pub target_id: &'a str,
    pub rows: &'a [CanonicalRecord],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ServiceEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// 解包：success=false 或缺少 data 均视为失败
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err("响应缺少 data".to_string()),
            (false, _) => Err(self.error.unwrap_or_else(|| "远端未返回错误信息".to_string())),
        }
    }
}
