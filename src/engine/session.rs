// ==========================================
// 表格批量导入管道 - 导入会话 Actor
// ==========================================
// 职责: 在独立任务中持有向导，按消息顺序执行操作员命令
// 通信: mpsc 命令 + oneshot 回复（SessionHandle 可克隆）
// 挂起点: 文件读取（handle 侧）、校验请求、提交请求
// 规则:
// - 校验 / 提交请求在 actor 内与命令接收并行等待，请求在途时仍可处理
//   取消与快照命令
// - 请求与取消令牌竞争；取消后到达的响应由向导按 request_id 丢弃
// - 所有 handle 释放后 actor 取消在途请求并退出
// ==========================================

use crate::domain::outcome::{CommitOutcome, ValidationOutcome};
use crate::engine::commit_orchestrator::CommitOrchestrator;
use crate::engine::validation_orchestrator::ValidationOrchestrator;
use crate::engine::wizard::{Applied, ImportWizard, RequestKind, RequestTicket, WizardSnapshot};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::FileFormat;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

type Reply<T> = oneshot::Sender<ImportResult<T>>;

// ==========================================
// 命令
// ==========================================

enum SessionCommand {
    Upload {
        bytes: Vec<u8>,
        format: FileFormat,
        sheet: Option<String>,
        reply: Reply<WizardSnapshot>,
    },
    SetMapping {
        field_key: String,
        header: Option<String>,
        reply: Reply<WizardSnapshot>,
    },
    Validate {
        reply: Reply<WizardSnapshot>,
    },
    BackToMapping {
        reply: Reply<WizardSnapshot>,
    },
    Commit {
        reply: Reply<WizardSnapshot>,
    },
    Cancel {
        reply: oneshot::Sender<WizardSnapshot>,
    },
    Snapshot {
        reply: oneshot::Sender<WizardSnapshot>,
    },
}

/// 在途请求的结果
enum RequestResult {
    Validation(ImportResult<ValidationOutcome>),
    Commit(ImportResult<CommitOutcome>),
}

struct PendingRequest {
    request_id: u64,
    future: BoxFuture<'static, RequestResult>,
    reply: Reply<WizardSnapshot>,
}

/// 会话协作方
#[derive(Clone)]
pub struct SessionServices {
    pub validation: ValidationOrchestrator,
    pub commit: CommitOrchestrator,
}

// ==========================================
// ImportSession
// ==========================================

pub struct ImportSession;

impl ImportSession {
    /// 启动会话 actor（需在 tokio 运行时内调用）
    pub fn spawn(wizard: ImportWizard, services: SessionServices) -> SessionHandle {
        let (tx, rx) = mpsc::channel(32);
        let session_id = wizard.session_id().to_string();
        tokio::spawn(actor_loop(wizard, services, rx));
        info!(session_id = %session_id, "导入会话已启动");
        SessionHandle { tx, session_id }
    }
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    session_id: String,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 上传内存中的文件内容
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        format: FileFormat,
        sheet: Option<String>,
    ) -> ImportResult<WizardSnapshot> {
        self.request(|reply| SessionCommand::Upload {
            bytes,
            format,
            sheet,
            reply,
        })
        .await
    }

    /// 读取文件后上传（格式按扩展名识别）
    pub async fn upload_file(
        &self,
        path: &Path,
        sheet: Option<String>,
    ) -> ImportResult<WizardSnapshot> {
        let format = FileFormat::from_path(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ImportError::FileRead(format!("{}: {}", path.display(), e)))?;
        self.upload(bytes, format, sheet).await
    }

    pub async fn set_mapping(
        &self,
        field_key: &str,
        header: Option<&str>,
    ) -> ImportResult<WizardSnapshot> {
        let field_key = field_key.to_string();
        let header = header.map(str::to_string);
        self.request(|reply| SessionCommand::SetMapping {
            field_key,
            header,
            reply,
        })
        .await
    }

    /// 发起校验并等待结果（失败时会话已回到 Mapping）
    pub async fn validate(&self) -> ImportResult<WizardSnapshot> {
        self.request(|reply| SessionCommand::Validate { reply }).await
    }

    pub async fn back_to_mapping(&self) -> ImportResult<WizardSnapshot> {
        self.request(|reply| SessionCommand::BackToMapping { reply })
            .await
    }

    /// 提交 valid 分区并等待结果（失败时会话停留在 Review）
    pub async fn commit(&self) -> ImportResult<WizardSnapshot> {
        self.request(|reply| SessionCommand::Commit { reply }).await
    }

    pub async fn cancel(&self) -> ImportResult<WizardSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Cancel { reply }).await?;
        rx.await.map_err(|_| ImportError::Cancelled)
    }

    pub async fn snapshot(&self) -> ImportResult<WizardSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| ImportError::Cancelled)
    }

    async fn request<F>(&self, build: F) -> ImportResult<WizardSnapshot>
    where
        F: FnOnce(Reply<WizardSnapshot>) -> SessionCommand,
    {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await.map_err(|_| ImportError::Cancelled)?
    }

    async fn send(&self, cmd: SessionCommand) -> ImportResult<()> {
        self.tx.send(cmd).await.map_err(|_| ImportError::Cancelled)
    }
}

// ==========================================
// Actor 主循环
// ==========================================

async fn actor_loop(
    mut wizard: ImportWizard,
    services: SessionServices,
    mut rx: mpsc::Receiver<SessionCommand>,
) {
    debug!(session_id = %wizard.session_id(), "actor_loop: started");
    let mut pending: Option<PendingRequest> = None;

    loop {
        tokio::select! {
            cmd = rx.recv() => {
                let Some(cmd) = cmd else {
                    // 所有 handle 已释放
                    wizard.cancel();
                    break;
                };
                if let Some(request) = handle_command(&mut wizard, &services, cmd) {
                    pending = Some(request);
                }
            }
            result = next_result(&mut pending) => {
                if let Some(request) = pending.take() {
                    let reply = apply_result(&mut wizard, request.request_id, result);
                    let _ = request.reply.send(reply);
                }
            }
        }
    }

    debug!(session_id = %wizard.session_id(), "actor_loop: stopped");
}

/// 等待在途请求完成；无在途请求时永不返回
async fn next_result(pending: &mut Option<PendingRequest>) -> RequestResult {
    match pending {
        Some(request) => (&mut request.future).await,
        None => std::future::pending().await,
    }
}

fn handle_command(
    wizard: &mut ImportWizard,
    services: &SessionServices,
    cmd: SessionCommand,
) -> Option<PendingRequest> {
    match cmd {
        SessionCommand::Upload {
            bytes,
            format,
            sheet,
            reply,
        } => {
            let result = wizard
                .upload(&bytes, format, sheet.as_deref())
                .map(|_| wizard.snapshot());
            let _ = reply.send(result);
            None
        }
        SessionCommand::SetMapping {
            field_key,
            header,
            reply,
        } => {
            let result = wizard
                .set_mapping(&field_key, header.as_deref())
                .map(|_| wizard.snapshot());
            let _ = reply.send(result);
            None
        }
        SessionCommand::BackToMapping { reply } => {
            let _ = reply.send(wizard.back_to_mapping().map(|_| wizard.snapshot()));
            None
        }
        SessionCommand::Validate { reply } => match wizard.begin_validation() {
            Ok(ticket) => Some(dispatch(ticket, services, reply)),
            Err(e) => {
                let _ = reply.send(Err(e));
                None
            }
        },
        SessionCommand::Commit { reply } => match wizard.begin_commit() {
            Ok(ticket) => Some(dispatch(ticket, services, reply)),
            Err(e) => {
                let _ = reply.send(Err(e));
                None
            }
        },
        SessionCommand::Cancel { reply } => {
            wizard.cancel();
            let _ = reply.send(wizard.snapshot());
            None
        }
        SessionCommand::Snapshot { reply } => {
            let _ = reply.send(wizard.snapshot());
            None
        }
    }
}

/// 将请求包装为可与取消令牌竞争的 future
fn dispatch(
    ticket: RequestTicket,
    services: &SessionServices,
    reply: Reply<WizardSnapshot>,
) -> PendingRequest {
    let RequestTicket {
        request_id,
        kind,
        target_id,
        rows,
        token,
    } = ticket;

    let future = match kind {
        RequestKind::Validate => {
            let orchestrator = services.validation.clone();
            async move {
                tokio::select! {
                    _ = token.cancelled() => RequestResult::Validation(Err(ImportError::Cancelled)),
                    r = orchestrator.validate(&target_id, &rows) => RequestResult::Validation(r),
                }
            }
            .boxed()
        }
        RequestKind::Commit => {
            let orchestrator = services.commit.clone();
            async move {
                tokio::select! {
                    _ = token.cancelled() => RequestResult::Commit(Err(ImportError::Cancelled)),
                    r = orchestrator.commit(&target_id, &rows) => RequestResult::Commit(r),
                }
            }
            .boxed()
        }
    };

    PendingRequest {
        request_id,
        future,
        reply,
    }
}

fn apply_result(
    wizard: &mut ImportWizard,
    request_id: u64,
    result: RequestResult,
) -> ImportResult<WizardSnapshot> {
    let applied = match result {
        RequestResult::Validation(r) => wizard.complete_validation(request_id, r)?,
        RequestResult::Commit(r) => wizard.complete_commit(request_id, r)?,
    };
    match applied {
        Applied::Applied => Ok(wizard.snapshot()),
        Applied::Discarded => Err(ImportError::Cancelled),
    }
}
