// ==========================================
// 表格批量导入管道 - HTTP 校验/提交客户端
// ==========================================
// 协议: POST {targetId, rows} → {success, data?, error?}
// 规则: 传输错误 / 非 2xx / success=false 统一转换为所在阶段的请求错误
// ==========================================

use crate::domain::outcome::{CommitOutcome, ValidationOutcome};
use crate::domain::record::CanonicalRecord;
use crate::gateway::{CommitService, ServiceEnvelope, ServiceRequest, ValidationService};
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

// ==========================================
// 通用信封客户端
// ==========================================

/// 绑定单个地址的 JSON POST 客户端
#[derive(Clone)]
struct EnvelopeClient {
    client: reqwest::Client,
    url: String,
}

impl EnvelopeClient {
    fn new(url: &str, timeout: Duration) -> ImportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImportError::Configuration(format!("HTTP 客户端初始化失败: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// 发送整批数据并解包信封（错误为文本，由调用方决定错误类型）
    async fn post<T: DeserializeOwned>(
        &self,
        target_id: &str,
        rows: &[CanonicalRecord],
    ) -> Result<T, String> {
        let body = ServiceRequest { target_id, rows };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("请求发送失败: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            // 错误响应体也可能是信封格式
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ServiceEnvelope<serde_json::Value>>(&text)
                .ok()
                .and_then(|env| env.error)
                .unwrap_or(text);
            return Err(format!("HTTP {}: {}", status.as_u16(), detail));
        }

        let envelope: ServiceEnvelope<T> = response
            .json()
            .await
            .map_err(|e| format!("响应解析失败: {}", e))?;

        envelope.into_result()
    }
}

// ==========================================
// 校验服务
// ==========================================

pub struct HttpValidationService {
    inner: EnvelopeClient,
}

impl HttpValidationService {
    pub fn new(url: &str, timeout: Duration) -> ImportResult<Self> {
        Ok(Self {
            inner: EnvelopeClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl ValidationService for HttpValidationService {
    async fn validate(
        &self,
        target_id: &str,
        rows: &[CanonicalRecord],
    ) -> ImportResult<ValidationOutcome> {
        debug!(url = %self.inner.url, target_id, rows = rows.len(), "发送校验请求");
        self.inner.post(target_id, rows).await.map_err(|msg| {
            warn!(target_id, error = %msg, "校验请求失败");
            ImportError::ValidationRequest(msg)
        })
    }
}

// ==========================================
// 提交服务
// ==========================================

pub struct HttpCommitService {
    inner: EnvelopeClient,
}

impl HttpCommitService {
    pub fn new(url: &str, timeout: Duration) -> ImportResult<Self> {
        Ok(Self {
            inner: EnvelopeClient::new(url, timeout)?,
        })
    }
}

#[async_trait]
impl CommitService for HttpCommitService {
    async fn commit(
        &self,
        target_id: &str,
        rows: &[CanonicalRecord],
    ) -> ImportResult<CommitOutcome> {
        debug!(url = %self.inner.url, target_id, rows = rows.len(), "发送提交请求");
        self.inner.post(target_id, rows).await.map_err(|msg| {
            warn!(target_id, error = %msg, "提交请求失败");
            ImportError::CommitRequest(msg)
        })
    }
}
