// ==========================================
// 表格批量导入管道 - 导入层 Trait
// ==========================================
// 职责: 定义文件解析接口（不包含实现）
// ==========================================

use crate::domain::record::ParsedSheet;
use crate::importer::error::ImportResult;

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: DelimitedParser, WorkbookParser
pub trait FileParser: Send + Sync {
    /// 解析文件内容为表头 + 数据行
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - sheet: 工作表名（分隔文本忽略；工作簿为 None 时取第一个）
    ///
    /// # 返回
    /// - Ok(ParsedSheet): 表头与数据行（文件顺序）
    /// - Err(EmptyFile): 没有数据行
    /// - Err(Parse): 文件损坏或无法解码
    fn parse_bytes(&self, bytes: &[u8], sheet: Option<&str>) -> ImportResult<ParsedSheet>;
}
