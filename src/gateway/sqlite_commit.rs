// ==========================================
// 表格批量导入管道 - SQLite 本地提交
// ==========================================
// 职责: 离线 / 演练模式下替代远端提交服务
// 表结构: 每个导入目标一张表（表名取 target_collection_name）
// 规则:
// - 整批一个事务，每行一个 SAVEPOINT
// - 单行失败（如重复记录）只回滚该行，其余行照常写入
// - payload 列（序列化后的字段集）唯一：字段完全相同的行视为重复记录，
//   跨批次、跨文件同样生效，重复行记为单行失败
// - 每批写一条 import_batch 记录
// ==========================================

use crate::config::SchemaRegistry;
use crate::db::{open_sqlite_connection, sanitize_table_name};
use crate::domain::outcome::{CommitOutcome, RowFailure};
use crate::domain::record::CanonicalRecord;
use crate::gateway::CommitService;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

pub struct SqliteCommitService {
    conn: Arc<Mutex<Connection>>,
    registry: Arc<SchemaRegistry>,
}

impl SqliteCommitService {
    /// 使用已打开的连接
    pub fn new(conn: Connection, registry: Arc<SchemaRegistry>) -> ImportResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS import_batch (
                batch_id TEXT PRIMARY KEY,
                target_id TEXT NOT NULL,
                success_count INTEGER NOT NULL,
                failure_count INTEGER NOT NULL,
                imported_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            registry,
        })
    }

    /// 打开数据库文件
    pub fn open(db_path: &Path, registry: Arc<SchemaRegistry>) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::new(conn, registry)
    }

    /// 统计某导入目标已落库行数
    pub fn count_rows(&self, target_id: &str) -> ImportResult<usize> {
        let table = self.table_for(target_id)?;
        let conn = lock(&self.conn)?;
        ensure_table(&conn, &table)?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 统计已记录的批次数
    pub fn count_batches(&self) -> ImportResult<usize> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM import_batch", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn table_for(&self, target_id: &str) -> ImportResult<String> {
        let target = self.registry.get_target(target_id)?;
        Ok(sanitize_table_name(&target.target_collection_name))
    }
}

#[async_trait]
impl CommitService for SqliteCommitService {
    async fn commit(
        &self,
        target_id: &str,
        rows: &[CanonicalRecord],
    ) -> ImportResult<CommitOutcome> {
        let table = self
            .table_for(target_id)
            .map_err(|e| ImportError::CommitRequest(e.to_string()))?;
        let conn = Arc::clone(&self.conn);
        let target_id = target_id.to_string();
        let rows = rows.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            insert_batch(&mut guard, &table, &target_id, &rows)
        })
        .await
        .map_err(|e| ImportError::CommitRequest(format!("落库任务异常终止: {}", e)))?
        .map_err(|e| match e {
            ImportError::CommitRequest(_) => e,
            other => ImportError::CommitRequest(other.to_string()),
        })
    }
}

// ==========================================
// 事务内写入
// ==========================================

fn lock(conn: &Mutex<Connection>) -> ImportResult<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| ImportError::Database("数据库连接锁已失效".to_string()))
}

fn ensure_table(conn: &Connection, table: &str) -> ImportResult<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            record_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            row_index INTEGER NOT NULL,
            payload TEXT NOT NULL UNIQUE,
            imported_at TEXT NOT NULL
        );
        "#
    ))?;
    Ok(())
}

fn insert_batch(
    conn: &mut Connection,
    table: &str,
    target_id: &str,
    rows: &[CanonicalRecord],
) -> ImportResult<CommitOutcome> {
    ensure_table(conn, table)?;

    let batch_id = Uuid::new_v4().to_string();
    let imported_at = Utc::now().to_rfc3339();
    let sql = format!(
        "INSERT INTO {} (record_id, batch_id, row_index, payload, imported_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        table
    );

    let mut tx = conn.transaction()?;
    let mut outcome = CommitOutcome::default();

    for record in rows {
        let payload = serde_json::to_string(&record.fields)?;
        let sp = tx.savepoint()?;
        let result = sp.execute(
            &sql,
            params![
                Uuid::new_v4().to_string(),
                batch_id,
                record.row_index as i64,
                payload,
                imported_at
            ],
        );
        match result {
            Ok(_) => {
                sp.commit()?;
                outcome.success_count += 1;
            }
            Err(e) => {
                // 未提交的 savepoint 在 drop 时回滚
                drop(sp);
                warn!(table, row_index = record.row_index, error = %e, "单行写入失败");
                outcome.failure_count += 1;
                outcome.failed_rows.push(RowFailure {
                    row_index: record.row_index,
                    error: describe_insert_error(&e),
                });
            }
        }
    }

    tx.execute(
        "INSERT INTO import_batch (batch_id, target_id, success_count, failure_count, imported_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            batch_id,
            target_id,
            outcome.success_count as i64,
            outcome.failure_count as i64,
            imported_at
        ],
    )?;
    tx.commit()?;

    info!(
        table,
        batch_id = %batch_id,
        success = outcome.success_count,
        failure = outcome.failure_count,
        "批次落库完成"
    );
    Ok(outcome)
}

fn describe_insert_error(err: &rusqlite::Error) -> String {
    match err.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => "记录已存在（重复行）".to_string(),
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use serde_json::json;

    fn service() -> SqliteCommitService {
        SqliteCommitService::new(open_in_memory().unwrap(), Arc::new(SchemaRegistry::builtin()))
            .unwrap()
    }

    fn user(row_index: usize, email: &str) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(row_index);
        record.fields.insert("name".into(), json!("Ann"));
        record.fields.insert("email".into(), json!(email));
        record
    }

    #[tokio::test]
    async fn test_commit_all_rows() {
        let svc = service();
        let outcome = svc
            .commit("users", &[user(2, "a@x"), user(3, "b@x")])
            .await
            .unwrap();

        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.failure_count, 0);
        assert_eq!(svc.count_rows("users").unwrap(), 2);
        assert_eq!(svc.count_batches().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_row_fails_individually() {
        let svc = service();
        let outcome = svc
            .commit("users", &[user(2, "a@x"), user(3, "a@x"), user(4, "c@x")])
            .await
            .unwrap();

        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.failed_rows[0].row_index, 3);
        assert_eq!(svc.count_rows("users").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_detected_across_batches() {
        let svc = service();
        svc.commit("users", &[user(2, "a@x")]).await.unwrap();

        // 行号不同、字段相同：仍视为重复
        let outcome = svc
            .commit("users", &[user(7, "a@x"), user(8, "d@x")])
            .await
            .unwrap();

        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.failed_rows[0].row_index, 7);
        assert_eq!(svc.count_rows("users").unwrap(), 2);
        assert_eq!(svc.count_batches().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_target_is_commit_request_error() {
        let svc = service();
        let err = svc.commit("ghosts", &[user(2, "a@x")]).await.unwrap_err();
        assert!(matches!(err, ImportError::CommitRequest(_)));
    }

    #[tokio::test]
    async fn test_collection_name_used_as_table() {
        let svc = service();
        let mut reading = CanonicalRecord::new(2);
        reading.fields.insert("meter".into(), json!("M1"));
        svc.commit("readings", &[reading]).await.unwrap();

        let conn = svc.conn.lock().unwrap();
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='meter_readings'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(exists, 1);
    }
}
