// ==========================================
// 表格批量导入管道 - 命令行定义
// ==========================================

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// 表格批量导入工具
#[derive(Parser, Debug)]
#[command(name = "tabular-import", version, about = "按导入目标模式批量导入表格数据")]
pub struct Cli {
    /// 配置文件路径（JSON）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 日志输出为 JSON
    #[arg(long, global = true)]
    pub json_log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 列出导入目标
    Targets {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// 查看文件表头与自动映射
    Inspect {
        /// 待导入文件（csv/tsv/txt/xlsx/xlsm/xls/ods）
        file: PathBuf,

        /// 导入目标（给出时展示自动映射）
        #[arg(short, long)]
        target: Option<String>,

        /// 工作表名（默认第一个）
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// 执行导入：解析 → 映射 → 校验 → （可选）提交
    Run {
        file: PathBuf,

        #[arg(short, long)]
        target: String,

        /// 手工映射，格式 key=列名；列名留空表示清除
        #[arg(short, long = "map", value_name = "KEY=HEADER")]
        mappings: Vec<String>,

        #[arg(short, long)]
        sheet: Option<String>,

        /// 校验通过后提交有效行
        #[arg(long)]
        commit: bool,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// 解析 key=列名
pub fn parse_mapping_arg(raw: &str) -> Option<(String, Option<String>)> {
    let (key, header) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let header = header.trim();
    let header = (!header.is_empty()).then(|| header.to_string());
    Some((key.to_string(), header))
}
