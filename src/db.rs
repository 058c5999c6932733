// ==========================================
// 表格批量导入管道 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - journal_mode=WAL 让读取方不阻塞提交事务
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置（自动创建上级目录）
pub fn open_sqlite_connection(db_path: &Path) -> ImportResult<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ImportError::Database(format!("无法创建目录 {}: {}", parent.display(), e))
            })?;
        }
    }
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 内存库（测试 / 演练）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// 将集合名规整为安全的表名（仅保留字母、数字、下划线）
pub fn sanitize_table_name(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "t_");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("imports.db");
        let conn = open_sqlite_connection(&path).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(path.exists());
    }

    #[test]
    fn test_sanitize_table_name() {
        assert_eq!(sanitize_table_name("meter_readings"), "meter_readings");
        assert_eq!(sanitize_table_name("users; DROP TABLE x"), "users__DROP_TABLE_x");
        assert_eq!(sanitize_table_name("2024-data"), "t_2024_data");
        assert_eq!(sanitize_table_name(""), "t_");
    }
}
