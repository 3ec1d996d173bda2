use crate::app::CliApp;
use chrono::Utc;
use std::path::Path;
use tracing::{info, warn};
use vip_core::analyzer::{self, AnalysisResult};
use vip_core::backup::parse_export;
use vip_core::error::Result;

/// 分析 VIP 到期情况并写入报告
///
/// 指定 `file` 时离线分析已有的备份文件，否则在线获取 VIP 列表。
pub async fn run_analyze(app: &CliApp, file: Option<&Path>) -> Result<()> {
    let (result, report_path) = match file {
        Some(path) => {
            info!("📄 分析备份文件: {}", path.display());
            let content = tokio::fs::read_to_string(path).await?;
            let result = analyzer::analyze(&parse_export(&content), Utc::now());
            let report_path = app.backup_manager.write_report(&result).await?;
            (result, report_path)
        }
        None => {
            info!("🔍 获取 VIP 列表...");
            app.tasks.analyze_vips().await?
        }
    };

    print_analysis(&result);
    info!("📝 报告已保存: {}", report_path.display());
    Ok(())
}

/// 以日志形式输出分析结果
pub fn print_analysis(result: &AnalysisResult) {
    info!("📊 VIP 分析结果");
    info!("==================");
    info!("   总数: {}", result.total);
    info!("   永久: {}", result.permanent);
    info!("   临时: {}", result.temporary);
    info!("   已过期: {}", result.expired);
    info!("   今天到期: {}", result.expiring_today);
    info!("   7天内到期: {}", result.expiring_soon);
    info!("🖥️  平台分布:");
    info!("   PC: {}", result.platforms.pc);
    info!("   主机: {}", result.platforms.console);
    info!("   未知: {}", result.platforms.unknown);

    if result.alerts.is_empty() {
        info!("✅ 没有需要关注的 VIP");
        return;
    }

    warn!("⚠️  需要关注的 VIP:");
    for line in result.alert_lines() {
        warn!("   {}", line);
    }
}
