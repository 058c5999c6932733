// ==========================================
// 表格批量导入管道 - 引擎层事件发布
// ==========================================
// 职责: 定义导入会话事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，调用方（CLI / 上层服务）实现适配器
// ==========================================

use crate::engine::wizard::WizardStage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// 导入事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportEventType {
    /// 向导阶段变更
    StageChanged,
    /// 校验完成（已得到分区）
    ValidationCompleted,
    /// 提交完成
    CommitCompleted,
    /// 校验 / 提交请求失败
    RequestFailed,
    /// 会话取消
    Cancelled,
}

impl ImportEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            ImportEventType::StageChanged => "StageChanged",
            ImportEventType::ValidationCompleted => "ValidationCompleted",
            ImportEventType::CommitCompleted => "CommitCompleted",
            ImportEventType::RequestFailed => "RequestFailed",
            ImportEventType::Cancelled => "Cancelled",
        }
    }
}

/// 导入事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEvent {
    /// 会话 ID
    pub session_id: String,
    /// 导入目标
    pub target_id: String,
    pub event_type: ImportEventType,
    /// 事件发生后的阶段
    pub stage: WizardStage,
    /// 附加说明（计数 / 错误信息）
    pub detail: Option<String>,
}

impl ImportEvent {
    pub fn new(
        session_id: &str,
        target_id: &str,
        event_type: ImportEventType,
        stage: WizardStage,
        detail: Option<String>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            target_id: target_id.to_string(),
            event_type,
            stage,
            detail,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 导入事件发布者
///
/// 发布失败不影响向导流程，只记录告警
pub trait ImportEventPublisher: Send + Sync {
    fn publish(&self, event: &ImportEvent) -> anyhow::Result<()>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ImportEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: &ImportEvent) -> anyhow::Result<()> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - session_id={}, event_type={}",
            event.session_id,
            event.event_type.as_str()
        );
        Ok(())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn ImportEventPublisher>> 的使用
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ImportEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn ImportEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者），失败仅告警
    pub fn publish(&self, event: ImportEvent) {
        let Some(publisher) = &self.inner else {
            return;
        };
        if let Err(e) = publisher.publish(&event) {
            tracing::warn!(
                session_id = %event.session_id,
                event_type = event.event_type.as_str(),
                error = %e,
                "事件发布失败"
            );
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
