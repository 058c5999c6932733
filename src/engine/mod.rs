// ==========================================
// 表格批量导入管道 - 引擎层
// ==========================================
// 职责: 校验 / 提交编排、向导状态机、会话 actor、事件发布
// 红线: 引擎不解析文件、不拼 SQL、不发 HTTP（经由 gateway trait）
// ==========================================

pub mod commit_orchestrator;
pub mod events;
pub mod session;
pub mod validation_orchestrator;
pub mod wizard;

// 重导出核心类型
pub use commit_orchestrator::CommitOrchestrator;
pub use events::{
    ImportEvent, ImportEventPublisher, ImportEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use session::{ImportSession, SessionHandle, SessionServices};
pub use validation_orchestrator::ValidationOrchestrator;
pub use wizard::{
    Applied, ImportWizard, RequestKind, RequestTicket, WizardOptions, WizardSnapshot, WizardStage,
};
