#![allow(dead_code)]

// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 可记录调用的校验 / 提交协作方、测试文件生成、API 装配
// ==========================================

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tabular_import::config::{PipelineConfig, SchemaRegistry};
use tabular_import::domain::{CanonicalRecord, CommitOutcome, InvalidRow, ValidationOutcome};
use tabular_import::gateway::{CommitService, ValidationService};
use tabular_import::importer::{ImportError, ImportResult};
use tabular_import::ImportApi;

// ==========================================
// 校验服务替身
// ==========================================

/// 将指定行号判为无效，其余为有效；可设置前 N 次调用失败
#[derive(Default)]
pub struct RecordingValidator {
    invalid_rows: BTreeSet<usize>,
    fail_first: AtomicUsize,
    pub calls: Mutex<Vec<Vec<CanonicalRecord>>>,
}

impl RecordingValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(rows: &[usize]) -> Self {
        Self {
            invalid_rows: rows.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ValidationService for RecordingValidator {
    async fn validate(
        &self,
        _target_id: &str,
        rows: &[CanonicalRecord],
    ) -> ImportResult<ValidationOutcome> {
        self.calls.lock().unwrap().push(rows.to_vec());

        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ImportError::ValidationRequest("校验服务不可用".to_string()));
        }

        let mut outcome = ValidationOutcome::default();
        for row in rows {
            if self.invalid_rows.contains(&row.row_index) {
                outcome.invalid_rows.push(InvalidRow::from_record(
                    row.clone(),
                    vec![format!("第 {} 行被拒绝", row.row_index)],
                ));
            } else {
                outcome.valid_rows.push(row.clone());
            }
        }
        Ok(outcome)
    }
}

// ==========================================
// 提交服务替身
// ==========================================

/// 记录每次提交的载荷；默认全部成功，可固定返回结果或前 N 次失败
#[derive(Default)]
pub struct RecordingCommitter {
    fixed: Option<CommitOutcome>,
    fail_first: AtomicUsize,
    pub payloads: Mutex<Vec<Vec<CanonicalRecord>>>,
}

impl RecordingCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(success_count: usize, failure_count: usize) -> Self {
        Self {
            fixed: Some(CommitOutcome {
                success_count,
                failure_count,
                failed_rows: vec![],
            }),
            ..Self::default()
        }
    }

    pub fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn committed_row_indices(&self) -> Vec<Vec<usize>> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|batch| batch.iter().map(|r| r.row_index).collect())
            .collect()
    }
}

#[async_trait]
impl CommitService for RecordingCommitter {
    async fn commit(
        &self,
        _target_id: &str,
        rows: &[CanonicalRecord],
    ) -> ImportResult<CommitOutcome> {
        self.payloads.lock().unwrap().push(rows.to_vec());

        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ImportError::CommitRequest("提交服务超时".to_string()));
        }

        Ok(self.fixed.clone().unwrap_or(CommitOutcome {
            success_count: rows.len(),
            failure_count: 0,
            failed_rows: vec![],
        }))
    }
}

// ==========================================
// API 装配
// ==========================================

pub fn build_api(
    validator: Arc<RecordingValidator>,
    committer: Arc<RecordingCommitter>,
    config: PipelineConfig,
) -> ImportApi {
    ImportApi::new(
        Arc::new(SchemaRegistry::builtin()),
        config,
        validator,
        committer,
    )
}

// ==========================================
// 测试文件
// ==========================================

/// 写入测试文件并返回路径
pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// 生成 users 目标的 CSV（Full Name, Email），n 条数据行
pub fn users_csv(n: usize) -> String {
    let mut csv = String::from("Full Name,Email\n");
    for i in 1..=n {
        csv.push_str(&format!("User {},user{}@example.com\n", i, i));
    }
    csv
}
