use crate::project_info::{metadata, version_info};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vip_core::constants::config;

/// CRCON VIP CLI - VIP 定时备份与到期告警工具
#[derive(Parser, Debug)]
#[command(name = "vip-cli")]
#[command(about = metadata::PROJECT_DESCRIPTION)]
#[command(version = version_info::CLI_VERSION)]
#[command(long_about = metadata::display::DESCRIPTION_LONG)]
#[command(author = metadata::PROJECT_AUTHORS)]
pub struct Cli {
    /// 配置文件路径（不存在时只使用环境变量）
    #[arg(short, long, default_value = config::CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// 测试 CRCON 连接和 Discord 通知
    Test,
    /// 立即下载一次 VIP 备份
    #[command(alias = "backup")]
    Download,
    /// 分析 VIP 到期情况
    Analyze {
        /// 分析已有的备份文件而不是在线获取
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// 清理超过保留天数的备份文件
    Cleanup {
        /// 保留天数（默认使用配置中的值）
        days: Option<u32>,
    },
    /// 启动定时任务和健康检查服务
    Start,
    /// 显示配置、备份文件和下次执行时间
    Status,
}
