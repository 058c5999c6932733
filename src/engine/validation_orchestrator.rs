// ==========================================
// 表格批量导入管道 - 校验编排器
// ==========================================
// 职责: 整批发送规范记录到校验服务，整理 valid / invalid 分区
// 规则:
// - 一次调用一批，不做逐行并发
// - 不重新推导字段规则，信任校验服务的分区
// - 分区必须互斥且覆盖全部提交行；服务漏报的行在有 systemErrors 时
//   归入 invalid 并附带系统错误，否则视为请求失败
// - 两个分区按 row_index 升序
// ==========================================

use crate::domain::outcome::{InvalidRow, ValidationOutcome};
use crate::domain::record::CanonicalRecord;
use crate::gateway::ValidationService;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct ValidationOrchestrator {
    service: Arc<dyn ValidationService>,
}

impl ValidationOrchestrator {
    pub fn new(service: Arc<dyn ValidationService>) -> Self {
        Self { service }
    }

    /// 整批校验
    ///
    /// # 返回
    /// - Ok(ValidationOutcome): 已核对、已排序的分区
    /// - Err(ValidationRequest): 传输失败或分区不可信
    #[instrument(skip(self, records), fields(rows = records.len()))]
    pub async fn validate(
        &self,
        target_id: &str,
        records: &[CanonicalRecord],
    ) -> ImportResult<ValidationOutcome> {
        let outcome = self.service.validate(target_id, records).await?;
        let outcome = reconcile(records, outcome)?;

        info!(
            valid = outcome.valid_rows.len(),
            invalid = outcome.invalid_rows.len(),
            system_errors = outcome.system_errors.len(),
            "校验完成"
        );
        Ok(outcome)
    }
}

/// 核对分区与提交行是否一致
pub fn reconcile(
    submitted: &[CanonicalRecord],
    mut outcome: ValidationOutcome,
) -> ImportResult<ValidationOutcome> {
    let expected: BTreeMap<usize, &CanonicalRecord> =
        submitted.iter().map(|r| (r.row_index, r)).collect();

    let mut seen = BTreeSet::new();
    let returned = outcome
        .valid_rows
        .iter()
        .map(|r| r.row_index)
        .chain(outcome.invalid_rows.iter().map(|r| r.row_index));
    for row_index in returned {
        if !expected.contains_key(&row_index) {
            return Err(ImportError::ValidationRequest(format!(
                "校验结果包含未提交的行: {}",
                row_index
            )));
        }
        if !seen.insert(row_index) {
            return Err(ImportError::ValidationRequest(format!(
                "校验结果中行 {} 出现多次",
                row_index
            )));
        }
    }

    let missing: Vec<usize> = expected
        .keys()
        .filter(|idx| !seen.contains(idx))
        .copied()
        .collect();
    if !missing.is_empty() {
        if outcome.system_errors.is_empty() {
            return Err(ImportError::ValidationRequest(format!(
                "校验结果缺少 {} 行（首行: {}）",
                missing.len(),
                missing[0]
            )));
        }
        warn!(missing = missing.len(), "校验服务未返回部分行，按系统错误计为无效");
        for row_index in missing {
            if let Some(record) = expected.get(&row_index) {
                outcome.invalid_rows.push(InvalidRow::from_record(
                    (*record).clone(),
                    outcome.system_errors.clone(),
                ));
            }
        }
    }

    outcome.valid_rows.sort_by_key(|r| r.row_index);
    outcome.invalid_rows.sort_by_key(|r| r.row_index);
    Ok(outcome)
}
