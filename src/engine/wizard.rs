// ==========================================
// 表格批量导入管道 - 导入向导状态机
// ==========================================
// 阶段: Upload → Mapping → Validating → Review → Committing → Result
// 回退:
// - Validating → Mapping   校验请求失败
// - Committing → Review    提交请求失败（有效行保留，可直接重试）
// - Review → Mapping       操作员返回修改映射
// - 任意阶段 → Cancelled   丢弃全部会话数据
// 单飞: 同一时刻最多一个校验 / 提交请求；请求以 request_id 标识，
//       与当前在途请求不匹配的响应一律丢弃
// 说明: 本模块为纯同步状态机，挂起点由 session 执行
// ==========================================

use crate::config::SchemaRegistry;
use crate::domain::outcome::{CommitOutcome, ValidationOutcome};
use crate::domain::record::{CanonicalRecord, ParsedSheet};
use crate::domain::schema::ImportTarget;
use crate::engine::events::{ImportEvent, ImportEventType, OptionalEventPublisher};
use crate::importer::column_mapper::{
    self, auto_map, validate_mapping_complete, Ambiguity, ColumnMapping,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{FileFormat, UniversalFileParser};
use crate::importer::row_transformer::RowTransformer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// 阶段
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WizardStage {
    Upload,
    Mapping,
    Validating,
    /// 已得到分区，等待操作员确认提交
    Review,
    Committing,
    Result,
    Cancelled,
}

impl WizardStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStage::Upload => "UPLOAD",
            WizardStage::Mapping => "MAPPING",
            WizardStage::Validating => "VALIDATING",
            WizardStage::Review => "REVIEW",
            WizardStage::Committing => "COMMITTING",
            WizardStage::Result => "RESULT",
            WizardStage::Cancelled => "CANCELLED",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardStage::Result | WizardStage::Cancelled)
    }
}

impl fmt::Display for WizardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 在途请求
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Validate,
    Commit,
}

/// 发起请求时交给执行方的凭据
#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub request_id: u64,
    pub kind: RequestKind,
    pub target_id: String,
    /// 本次请求要发送的记录（校验: 全部规范记录；提交: 仅 valid 分区）
    pub rows: Vec<CanonicalRecord>,
    pub token: CancellationToken,
}

#[derive(Debug)]
struct InFlight {
    request_id: u64,
    kind: RequestKind,
    token: CancellationToken,
}

/// 响应处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// 响应已应用到会话
    Applied,
    /// 过期响应（会话已取消或请求已被替换），已丢弃
    Discarded,
}

// ==========================================
// 会话快照（供上层渲染）
// ==========================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub session_id: String,
    pub target_id: String,
    pub stage: WizardStage,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub mapping: ColumnMapping,
    pub ambiguities: Vec<Ambiguity>,
    pub missing_required: Vec<String>,
    pub validation: Option<ValidationOutcome>,
    pub commit: Option<CommitOutcome>,
    pub last_error: Option<String>,
    pub request_in_flight: bool,
}

// ==========================================
// ImportWizard
// ==========================================

#[derive(Debug, Clone, Copy, Default)]
pub struct WizardOptions {
    /// 为 true 时存在无效行即禁止提交
    pub require_all_valid: bool,
}

pub struct ImportWizard {
    session_id: String,
    target: ImportTarget,
    options: WizardOptions,
    stage: WizardStage,
    sheet: Option<ParsedSheet>,
    mapping: ColumnMapping,
    ambiguities: Vec<Ambiguity>,
    validation: Option<ValidationOutcome>,
    commit: Option<CommitOutcome>,
    last_error: Option<String>,
    in_flight: Option<InFlight>,
    next_request_id: u64,
    transformer: RowTransformer,
    events: OptionalEventPublisher,
}

impl ImportWizard {
    /// 创建会话；未知导入目标为配置错误（致命）
    pub fn new(
        registry: &SchemaRegistry,
        target_id: &str,
        options: WizardOptions,
    ) -> ImportResult<Self> {
        let target = registry.get_target(target_id)?.clone();
        let session_id = Uuid::new_v4().to_string();
        info!(session_id = %session_id, target_id, "导入会话创建");

        Ok(Self {
            session_id,
            target,
            options,
            stage: WizardStage::Upload,
            sheet: None,
            mapping: ColumnMapping::new(),
            ambiguities: Vec::new(),
            validation: None,
            commit: None,
            last_error: None,
            in_flight: None,
            next_request_id: 1,
            transformer: RowTransformer::new(),
            events: OptionalEventPublisher::none(),
        })
    }

    pub fn with_events(mut self, events: OptionalEventPublisher) -> Self {
        self.events = events;
        self
    }

    // ===== 访问器 =====

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    pub fn target(&self) -> &ImportTarget {
        &self.target
    }

    pub fn headers(&self) -> &[String] {
        self.sheet.as_ref().map(|s| s.headers.as_slice()).unwrap_or(&[])
    }

    pub fn row_count(&self) -> usize {
        self.sheet.as_ref().map(ParsedSheet::row_count).unwrap_or(0)
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn ambiguities(&self) -> &[Ambiguity] {
        &self.ambiguities
    }

    pub fn validation(&self) -> Option<&ValidationOutcome> {
        self.validation.as_ref()
    }

    pub fn commit_outcome(&self) -> Option<&CommitOutcome> {
        self.commit.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn in_flight_request(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.request_id)
    }

    /// 未映射的必填字段标签（字段顺序）
    pub fn missing_required(&self) -> Vec<String> {
        validate_mapping_complete(&self.target, &self.mapping)
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            session_id: self.session_id.clone(),
            target_id: self.target.id.clone(),
            stage: self.stage,
            headers: self.headers().to_vec(),
            row_count: self.row_count(),
            mapping: self.mapping.clone(),
            ambiguities: self.ambiguities.clone(),
            missing_required: self.missing_required(),
            validation: self.validation.clone(),
            commit: self.commit.clone(),
            last_error: self.last_error.clone(),
            request_in_flight: self.in_flight.is_some(),
        }
    }

    // ==========================================
    // Upload → Mapping
    // ==========================================

    /// 解析上传文件并进入映射阶段；解析失败停留在原阶段
    pub fn upload(
        &mut self,
        bytes: &[u8],
        format: FileFormat,
        sheet: Option<&str>,
    ) -> ImportResult<()> {
        self.ensure_stage(
            &[WizardStage::Upload, WizardStage::Mapping, WizardStage::Review],
            WizardStage::Mapping,
        )?;

        match UniversalFileParser.parse(bytes, format, sheet) {
            Ok(parsed) => self.load_sheet(parsed),
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "文件解析失败");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// 载入已解析的表格并执行自动映射
    pub fn load_sheet(&mut self, sheet: ParsedSheet) -> ImportResult<()> {
        self.ensure_stage(
            &[WizardStage::Upload, WizardStage::Mapping, WizardStage::Review],
            WizardStage::Mapping,
        )?;

        let auto = auto_map(&self.target, &sheet.headers);
        info!(
            session_id = %self.session_id,
            headers = sheet.headers.len(),
            rows = sheet.row_count(),
            mapped = auto.mapping.len(),
            ambiguous = auto.ambiguities.len(),
            "文件已载入"
        );

        self.mapping = auto.mapping;
        self.ambiguities = auto.ambiguities;
        self.sheet = Some(sheet);
        self.validation = None;
        self.commit = None;
        self.last_error = None;
        self.transition(WizardStage::Mapping);
        Ok(())
    }

    // ==========================================
    // Mapping
    // ==========================================

    /// 人工修改映射（header 为 None 或空白表示清除）
    pub fn set_mapping(&mut self, field_key: &str, header: Option<&str>) -> ImportResult<()> {
        self.ensure_stage(&[WizardStage::Mapping], WizardStage::Mapping)?;

        let headers = self.headers().to_vec();
        column_mapper::set_mapping(&self.target, &headers, &mut self.mapping, field_key, header)?;
        self.ambiguities.retain(|a| a.field_key != field_key);
        debug!(session_id = %self.session_id, field_key, header = ?header, "映射已修改");
        Ok(())
    }

    /// Review → Mapping（保留映射，清空分区）
    pub fn back_to_mapping(&mut self) -> ImportResult<()> {
        self.ensure_stage(&[WizardStage::Review], WizardStage::Mapping)?;
        self.validation = None;
        self.last_error = None;
        self.transition(WizardStage::Mapping);
        Ok(())
    }

    // ==========================================
    // Mapping → Validating → Review
    // ==========================================

    /// 发起校验：映射不完整时停留在 Mapping 并返回缺失字段
    pub fn begin_validation(&mut self) -> ImportResult<RequestTicket> {
        self.ensure_stage(&[WizardStage::Mapping], WizardStage::Validating)?;

        let missing = self.missing_required();
        if !missing.is_empty() {
            let err = ImportError::MappingIncomplete { missing };
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        let rows = match &self.sheet {
            Some(sheet) => self.transformer.transform(&self.target, &sheet.rows, &self.mapping),
            None => Vec::new(),
        };

        self.last_error = None;
        let ticket = self.open_request(RequestKind::Validate, rows);
        self.transition(WizardStage::Validating);
        Ok(ticket)
    }

    /// 应用校验响应
    ///
    /// # 返回
    /// - Ok(Applied): 已进入 Review
    /// - Ok(Discarded): 过期响应
    /// - Err(e): 请求失败，已回到 Mapping
    pub fn complete_validation(
        &mut self,
        request_id: u64,
        result: ImportResult<ValidationOutcome>,
    ) -> ImportResult<Applied> {
        if !self.accept_response(request_id, RequestKind::Validate) {
            return Ok(Applied::Discarded);
        }
        self.in_flight = None;

        match result {
            Ok(outcome) => {
                let detail = format!(
                    "valid={} invalid={}",
                    outcome.valid_rows.len(),
                    outcome.invalid_rows.len()
                );
                self.validation = Some(outcome);
                self.transition(WizardStage::Review);
                self.emit(ImportEventType::ValidationCompleted, Some(detail));
                Ok(Applied::Applied)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.transition(WizardStage::Mapping);
                self.emit(ImportEventType::RequestFailed, Some(e.to_string()));
                Err(e)
            }
        }
    }

    // ==========================================
    // Review → Committing → Result
    // ==========================================

    /// 发起提交：只带 valid 分区
    pub fn begin_commit(&mut self) -> ImportResult<RequestTicket> {
        self.ensure_stage(&[WizardStage::Review], WizardStage::Committing)?;

        let (valid_rows, invalid_count) = match &self.validation {
            Some(v) => (v.valid_rows.clone(), v.invalid_rows.len()),
            None => (Vec::new(), 0),
        };
        if valid_rows.is_empty() {
            return Err(ImportError::NothingToCommit);
        }
        if self.options.require_all_valid && invalid_count > 0 {
            return Err(ImportError::InvalidRowsPresent(invalid_count));
        }

        self.last_error = None;
        let ticket = self.open_request(RequestKind::Commit, valid_rows);
        self.transition(WizardStage::Committing);
        Ok(ticket)
    }

    /// 应用提交响应；失败回到 Review，有效行保留
    pub fn complete_commit(
        &mut self,
        request_id: u64,
        result: ImportResult<CommitOutcome>,
    ) -> ImportResult<Applied> {
        if !self.accept_response(request_id, RequestKind::Commit) {
            return Ok(Applied::Discarded);
        }
        self.in_flight = None;

        match result {
            Ok(outcome) => {
                let detail = format!(
                    "success={} failure={}",
                    outcome.success_count, outcome.failure_count
                );
                self.commit = Some(outcome);
                self.transition(WizardStage::Result);
                self.emit(ImportEventType::CommitCompleted, Some(detail));
                Ok(Applied::Applied)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.transition(WizardStage::Review);
                self.emit(ImportEventType::RequestFailed, Some(e.to_string()));
                Err(e)
            }
        }
    }

    // ==========================================
    // 取消
    // ==========================================

    /// 取消会话：中止在途请求，丢弃全部会话数据（重复调用无副作用）
    pub fn cancel(&mut self) {
        if self.stage == WizardStage::Cancelled {
            return;
        }
        if let Some(flight) = self.in_flight.take() {
            debug!(request_id = flight.request_id, kind = ?flight.kind, "取消在途请求");
            flight.token.cancel();
        }
        self.sheet = None;
        self.mapping = ColumnMapping::new();
        self.ambiguities.clear();
        self.validation = None;
        self.commit = None;
        self.last_error = None;
        self.transition(WizardStage::Cancelled);
        self.emit(ImportEventType::Cancelled, None);
        info!(session_id = %self.session_id, "导入会话已取消");
    }

    // ==========================================
    // 内部
    // ==========================================

    fn ensure_stage(&self, allowed: &[WizardStage], to: WizardStage) -> ImportResult<()> {
        if self.stage == WizardStage::Cancelled {
            return Err(ImportError::Cancelled);
        }
        if self.in_flight.is_some() {
            return Err(ImportError::RequestInFlight);
        }
        if !allowed.contains(&self.stage) {
            return Err(ImportError::InvalidStateTransition {
                from: self.stage.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    fn open_request(&mut self, kind: RequestKind, rows: Vec<CanonicalRecord>) -> RequestTicket {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let token = CancellationToken::new();
        self.in_flight = Some(InFlight {
            request_id,
            kind,
            token: token.clone(),
        });
        debug!(request_id, kind = ?kind, rows = rows.len(), "请求已发起");
        RequestTicket {
            request_id,
            kind,
            target_id: self.target.id.clone(),
            rows,
            token,
        }
    }

    fn accept_response(&self, request_id: u64, kind: RequestKind) -> bool {
        match &self.in_flight {
            Some(flight) if flight.request_id == request_id && flight.kind == kind => true,
            _ => {
                debug!(request_id, kind = ?kind, stage = %self.stage, "丢弃过期响应");
                false
            }
        }
    }

    fn transition(&mut self, to: WizardStage) {
        if self.stage == to {
            return;
        }
        debug!(session_id = %self.session_id, from = %self.stage, to = %to, "阶段变更");
        self.stage = to;
        self.emit(ImportEventType::StageChanged, None);
    }

    fn emit(&self, event_type: ImportEventType, detail: Option<String>) {
        self.events.publish(ImportEvent::new(
            &self.session_id,
            &self.target.id,
            event_type,
            self.stage,
            detail,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::InvalidRow;

    const CSV: &str = "Full Name,Email\nAnn,ann@x\nBob,bob@x\nCy,cy@x\n";

    fn wizard() -> ImportWizard {
        ImportWizard::new(&SchemaRegistry::builtin(), "users", WizardOptions::default()).unwrap()
    }

    fn uploaded() -> ImportWizard {
        let mut w = wizard();
        w.upload(CSV.as_bytes(), FileFormat::CSV, None).unwrap();
        w
    }

    fn all_valid(rows: Vec<CanonicalRecord>) -> ValidationOutcome {
        ValidationOutcome {
            valid_rows: rows,
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_target_is_fatal() {
        let err = ImportWizard::new(&SchemaRegistry::builtin(), "ghosts", WizardOptions::default())
            .err()
            .unwrap();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_upload_auto_maps() {
        let w = uploaded();
        assert_eq!(w.stage(), WizardStage::Mapping);
        assert_eq!(w.row_count(), 3);
        assert!(w.missing_required().is_empty());
    }

    #[test]
    fn test_parse_failure_keeps_stage() {
        let mut w = wizard();
        let err = w.upload(b"Full Name,Email\n", FileFormat::CSV, None).unwrap_err();
        assert!(matches!(err, ImportError::EmptyFile(_)));
        assert_eq!(w.stage(), WizardStage::Upload);
        assert!(w.last_error().is_some());
    }

    #[test]
    fn test_incomplete_mapping_blocks_validation() {
        let mut w = wizard();
        w.upload(b"Email\nann@x\n", FileFormat::CSV, None).unwrap();

        match w.begin_validation() {
            Err(ImportError::MappingIncomplete { missing }) => {
                assert_eq!(missing, vec!["Full Name".to_string()])
            }
            other => panic!("unexpected: {:?}", other.map(|t| t.request_id)),
        }
        assert_eq!(w.stage(), WizardStage::Mapping);
    }

    #[test]
    fn test_validation_ticket_carries_row_indices() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();

        assert_eq!(w.stage(), WizardStage::Validating);
        assert_eq!(ticket.kind, RequestKind::Validate);
        let indices: Vec<usize> = ticket.rows.iter().map(|r| r.row_index).collect();
        assert_eq!(indices, vec![2, 3, 4]);
    }

    #[test]
    fn test_single_flight() {
        let mut w = uploaded();
        w.begin_validation().unwrap();
        assert!(matches!(w.begin_validation(), Err(ImportError::RequestInFlight)));
        assert!(matches!(w.set_mapping("email", None), Err(ImportError::RequestInFlight)));
    }

    #[test]
    fn test_validation_failure_returns_to_mapping() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();

        let err = w
            .complete_validation(
                ticket.request_id,
                Err(ImportError::ValidationRequest("timeout".into())),
            )
            .unwrap_err();

        assert!(matches!(err, ImportError::ValidationRequest(_)));
        assert_eq!(w.stage(), WizardStage::Mapping);
        assert!(w.in_flight_request().is_none());
        assert!(w.begin_validation().is_ok());
    }

    #[test]
    fn test_commit_sends_only_valid_rows() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();
        let mut rows = ticket.rows.clone();
        let bad = rows.remove(1);
        let outcome = ValidationOutcome {
            valid_rows: rows,
            invalid_rows: vec![InvalidRow::from_record(bad, vec!["dup".into()])],
            system_errors: vec![],
        };
        w.complete_validation(ticket.request_id, Ok(outcome)).unwrap();
        assert_eq!(w.stage(), WizardStage::Review);

        let commit = w.begin_commit().unwrap();
        let indices: Vec<usize> = commit.rows.iter().map(|r| r.row_index).collect();
        assert_eq!(indices, vec![2, 4]);
    }

    #[test]
    fn test_require_all_valid_blocks_commit() {
        let mut w = ImportWizard::new(
            &SchemaRegistry::builtin(),
            "users",
            WizardOptions {
                require_all_valid: true,
            },
        )
        .unwrap();
        w.upload(CSV.as_bytes(), FileFormat::CSV, None).unwrap();
        let ticket = w.begin_validation().unwrap();
        let mut rows = ticket.rows.clone();
        let bad = rows.pop().unwrap();
        let outcome = ValidationOutcome {
            valid_rows: rows,
            invalid_rows: vec![InvalidRow::from_record(bad, vec!["x".into()])],
            system_errors: vec![],
        };
        w.complete_validation(ticket.request_id, Ok(outcome)).unwrap();

        assert!(matches!(w.begin_commit(), Err(ImportError::InvalidRowsPresent(1))));
        assert_eq!(w.stage(), WizardStage::Review);
    }

    #[test]
    fn test_nothing_to_commit() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();
        w.complete_validation(ticket.request_id, Ok(ValidationOutcome::default()))
            .unwrap();
        assert!(matches!(w.begin_commit(), Err(ImportError::NothingToCommit)));
    }

    #[test]
    fn test_commit_failure_keeps_review_and_rows() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();
        w.complete_validation(ticket.request_id, Ok(all_valid(ticket.rows)))
            .unwrap();

        let commit = w.begin_commit().unwrap();
        let err = w
            .complete_commit(commit.request_id, Err(ImportError::CommitRequest("503".into())))
            .unwrap_err();

        assert!(err.is_recoverable());
        assert_eq!(w.stage(), WizardStage::Review);
        assert_eq!(w.validation().unwrap().valid_rows.len(), 3);
        assert!(w.commit_outcome().is_none());

        let retry = w.begin_commit().unwrap();
        assert_eq!(retry.rows.len(), 3);
        assert_ne!(retry.request_id, commit.request_id);
    }

    #[test]
    fn test_commit_success_reaches_result() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();
        w.complete_validation(ticket.request_id, Ok(all_valid(ticket.rows)))
            .unwrap();
        let commit = w.begin_commit().unwrap();
        let outcome = CommitOutcome {
            success_count: 2,
            failure_count: 1,
            failed_rows: vec![],
        };
        w.complete_commit(commit.request_id, Ok(outcome)).unwrap();

        assert_eq!(w.stage(), WizardStage::Result);
        assert_eq!(w.commit_outcome().unwrap().success_count, 2);
        assert!(matches!(
            w.back_to_mapping(),
            Err(ImportError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_discards_late_response() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();

        w.cancel();
        assert!(ticket.token.is_cancelled());

        let applied = w
            .complete_validation(ticket.request_id, Ok(all_valid(ticket.rows)))
            .unwrap();
        assert_eq!(applied, Applied::Discarded);
        assert_eq!(w.stage(), WizardStage::Cancelled);
        assert!(w.validation().is_none());
        assert_eq!(w.row_count(), 0);
        assert!(w.mapping().is_empty());
    }

    #[test]
    fn test_mismatched_request_id_discarded() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();
        let applied = w
            .complete_validation(ticket.request_id + 1, Ok(ValidationOutcome::default()))
            .unwrap();
        assert_eq!(applied, Applied::Discarded);
        assert_eq!(w.stage(), WizardStage::Validating);
    }

    #[test]
    fn test_operations_after_cancel_rejected() {
        let mut w = uploaded();
        w.cancel();
        assert!(matches!(
            w.upload(CSV.as_bytes(), FileFormat::CSV, None),
            Err(ImportError::Cancelled)
        ));
    }

    #[test]
    fn test_back_to_mapping_then_reupload() {
        let mut w = uploaded();
        let ticket = w.begin_validation().unwrap();
        w.complete_validation(ticket.request_id, Ok(all_valid(ticket.rows)))
            .unwrap();

        w.back_to_mapping().unwrap();
        assert_eq!(w.stage(), WizardStage::Mapping);
        assert!(w.validation().is_none());

        w.upload(b"Email\nz@x\n", FileFormat::CSV, None).unwrap();
        assert_eq!(w.missing_required(), vec!["Full Name".to_string()]);
    }

    // ===== 事件 =====

    #[derive(Default)]
    struct RecordingPublisher {
        events: std::sync::Mutex<Vec<ImportEvent>>,
    }

    impl crate::engine::events::ImportEventPublisher for RecordingPublisher {
        fn publish(&self, event: &ImportEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    impl RecordingPublisher {
        fn sequence(&self) -> Vec<(ImportEventType, WizardStage)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| (e.event_type, e.stage))
                .collect()
        }
    }

    fn observed() -> (ImportWizard, std::sync::Arc<RecordingPublisher>) {
        let publisher = std::sync::Arc::new(RecordingPublisher::default());
        let w = wizard().with_events(OptionalEventPublisher::with_publisher(publisher.clone()));
        (w, publisher)
    }

    #[test]
    fn test_events_follow_happy_path() {
        let (mut w, publisher) = observed();
        w.upload(CSV.as_bytes(), FileFormat::CSV, None).unwrap();
        let ticket = w.begin_validation().unwrap();
        w.complete_validation(ticket.request_id, Ok(all_valid(ticket.rows)))
            .unwrap();
        let commit = w.begin_commit().unwrap();
        let outcome = CommitOutcome {
            success_count: 3,
            failure_count: 0,
            failed_rows: vec![],
        };
        w.complete_commit(commit.request_id, Ok(outcome)).unwrap();

        use ImportEventType::*;
        assert_eq!(
            publisher.sequence(),
            vec![
                (StageChanged, WizardStage::Mapping),
                (StageChanged, WizardStage::Validating),
                (StageChanged, WizardStage::Review),
                (ValidationCompleted, WizardStage::Review),
                (StageChanged, WizardStage::Committing),
                (StageChanged, WizardStage::Result),
                (CommitCompleted, WizardStage::Result),
            ]
        );

        let events = publisher.events.lock().unwrap();
        assert!(events.iter().all(|e| e.session_id == w.session_id() && e.target_id == "users"));
        assert_eq!(events[3].detail.as_deref(), Some("valid=3 invalid=0"));
        assert_eq!(events[6].detail.as_deref(), Some("success=3 failure=0"));
    }

    #[test]
    fn test_events_on_validation_failure() {
        let (mut w, publisher) = observed();
        w.upload(CSV.as_bytes(), FileFormat::CSV, None).unwrap();
        let ticket = w.begin_validation().unwrap();
        w.complete_validation(
            ticket.request_id,
            Err(ImportError::ValidationRequest("超时".into())),
        )
        .unwrap_err();

        let events = publisher.events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.event_type, ImportEventType::RequestFailed);
        assert_eq!(last.stage, WizardStage::Mapping);
        assert!(last.detail.as_deref().unwrap().contains("超时"));
        assert_eq!(events[events.len() - 2].event_type, ImportEventType::StageChanged);
        assert!(!events.iter().any(|e| e.event_type == ImportEventType::ValidationCompleted));
    }

    #[test]
    fn test_events_on_cancel() {
        let (mut w, publisher) = observed();
        w.upload(CSV.as_bytes(), FileFormat::CSV, None).unwrap();
        w.begin_validation().unwrap();
        w.cancel();
        w.cancel();

        use ImportEventType::*;
        assert_eq!(
            publisher.sequence(),
            vec![
                (StageChanged, WizardStage::Mapping),
                (StageChanged, WizardStage::Validating),
                (StageChanged, WizardStage::Cancelled),
                (Cancelled, WizardStage::Cancelled),
            ]
        );
    }
}
