// ==========================================
// 表格批量导入管道 - API 视图
// ==========================================
// 职责: 将会话快照整理为操作员界面 / CLI 直接渲染的结构
// ==========================================

use crate::domain::outcome::{CommitOutcome, RowFailure, ValidationOutcome};
use crate::domain::schema::ImportTarget;
use crate::engine::wizard::{WizardSnapshot, WizardStage};
use serde::{Deserialize, Serialize};

// ==========================================
// 导入目标
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetView {
    pub id: String,
    pub display_name: String,
    pub field_count: usize,
    pub required_labels: Vec<String>,
}

impl From<&ImportTarget> for TargetView {
    fn from(target: &ImportTarget) -> Self {
        Self {
            id: target.id.clone(),
            display_name: target.display_name.clone(),
            field_count: target.fields.len(),
            required_labels: target
                .required_fields()
                .map(|f| f.label.clone())
                .collect(),
        }
    }
}

// ==========================================
// 映射表
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMappingRow {
    pub key: String,
    pub label: String,
    pub required: bool,
    pub field_type: String,
    pub header: Option<String>,
    /// 自动映射时有多个候选列
    pub ambiguous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingView {
    pub stage: WizardStage,
    pub headers: Vec<String>,
    pub row_count: usize,
    /// 按字段定义顺序
    pub fields: Vec<FieldMappingRow>,
    pub missing_required: Vec<String>,
    pub ready: bool,
}

impl MappingView {
    pub fn build(target: &ImportTarget, snapshot: &WizardSnapshot) -> Self {
        let fields = target
            .fields
            .iter()
            .map(|field| FieldMappingRow {
                key: field.key.clone(),
                label: field.label.clone(),
                required: field.required,
                field_type: field.field_type.to_string(),
                header: snapshot.mapping.get(&field.key).map(str::to_string),
                ambiguous: snapshot
                    .ambiguities
                    .iter()
                    .any(|a| a.field_key == field.key),
            })
            .collect();

        Self {
            stage: snapshot.stage,
            headers: snapshot.headers.clone(),
            row_count: snapshot.row_count,
            fields,
            missing_required: snapshot.missing_required.clone(),
            ready: snapshot.missing_required.is_empty(),
        }
    }
}

// ==========================================
// 校验摘要
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowErrorPreview {
    pub row_index: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub submitted: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub system_errors: Vec<String>,
    /// 行错误预览（按行号升序，最多 preview_limit 条）
    pub error_preview: Vec<RowErrorPreview>,
    /// 预览是否被截断
    pub truncated: bool,
    pub can_commit: bool,
}

impl ValidationSummary {
    pub fn build(outcome: &ValidationOutcome, preview_limit: usize, require_all_valid: bool) -> Self {
        let error_preview: Vec<RowErrorPreview> = outcome
            .invalid_rows
            .iter()
            .take(preview_limit)
            .map(|row| RowErrorPreview {
                row_index: row.row_index,
                errors: row.errors.clone(),
            })
            .collect();

        let valid_count = outcome.valid_rows.len();
        let invalid_count = outcome.invalid_rows.len();
        Self {
            submitted: outcome.total(),
            valid_count,
            invalid_count,
            system_errors: outcome.system_errors.clone(),
            truncated: invalid_count > error_preview.len(),
            error_preview,
            can_commit: valid_count > 0 && !(require_all_valid && invalid_count > 0),
        }
    }
}

// ==========================================
// 提交报告
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitStatus {
    /// 全部成功
    Complete,
    /// 部分成功
    Partial,
    /// 无一成功
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub status: CommitStatus,
    pub success_count: usize,
    pub failure_count: usize,
    /// 校验阶段被排除的无效行数（未提交）
    pub skipped_invalid: usize,
    pub failed_rows: Vec<RowFailure>,
    pub message: String,
}

impl CommitReport {
    pub fn build(outcome: &CommitOutcome, skipped_invalid: usize) -> Self {
        let status = match (outcome.success_count, outcome.failure_count) {
            (0, _) => CommitStatus::Failed,
            (_, 0) => CommitStatus::Complete,
            _ => CommitStatus::Partial,
        };
        let mut message = match status {
            CommitStatus::Complete => format!("已导入全部 {} 条记录", outcome.success_count),
            CommitStatus::Partial => format!(
                "部分导入: 成功 {} 条，失败 {} 条",
                outcome.success_count, outcome.failure_count
            ),
            CommitStatus::Failed => format!("未导入任何记录（失败 {} 条）", outcome.failure_count),
        };
        if skipped_invalid > 0 {
            message.push_str(&format!("；另有 {} 条无效行未提交", skipped_invalid));
        }

        Self {
            status,
            success_count: outcome.success_count,
            failure_count: outcome.failure_count,
            skipped_invalid,
            failed_rows: outcome.failed_rows.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::InvalidRow;
    use crate::domain::record::CanonicalRecord;

    fn outcome(valid: usize, invalid: usize) -> ValidationOutcome {
        ValidationOutcome {
            valid_rows: (0..valid).map(|i| CanonicalRecord::new(i + 2)).collect(),
            invalid_rows: (0..invalid)
                .map(|i| {
                    InvalidRow::from_record(CanonicalRecord::new(valid + i + 2), vec!["x".into()])
                })
                .collect(),
            system_errors: vec![],
        }
    }

    #[test]
    fn test_summary_preview_is_bounded() {
        let summary = ValidationSummary::build(&outcome(3, 5), 2, false);
        assert_eq!(summary.submitted, 8);
        assert_eq!(summary.error_preview.len(), 2);
        assert!(summary.truncated);
        assert!(summary.can_commit);
    }

    #[test]
    fn test_summary_can_commit_rules() {
        assert!(!ValidationSummary::build(&outcome(0, 2), 10, false).can_commit);
        assert!(!ValidationSummary::build(&outcome(3, 1), 10, true).can_commit);
        assert!(ValidationSummary::build(&outcome(3, 0), 10, true).can_commit);
    }

    #[test]
    fn test_commit_report_partial_is_not_complete() {
        let report = CommitReport::build(
            &CommitOutcome {
                success_count: 7,
                failure_count: 1,
                failed_rows: vec![],
            },
            2,
        );
        assert_eq!(report.status, CommitStatus::Partial);
        assert_eq!(report.success_count, 7);
        assert_eq!(report.failure_count, 1);
        assert!(report.message.contains("成功 7 条"));
        assert!(report.message.contains("2 条无效行"));
    }

    #[test]
    fn test_commit_report_statuses() {
        let all = CommitReport::build(
            &CommitOutcome {
                success_count: 3,
                ..Default::default()
            },
            0,
        );
        assert_eq!(all.status, CommitStatus::Complete);

        let none = CommitReport::build(
            &CommitOutcome {
                failure_count: 3,
                ..Default::default()
            },
            0,
        );
        assert_eq!(none.status, CommitStatus::Failed);
    }
}
