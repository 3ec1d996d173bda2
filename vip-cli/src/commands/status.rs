use crate::app::CliApp;
use crate::project_info::version_info;
use crate::utils::format_size;
use chrono::Utc;
use tracing::{info, warn};
use vip_core::error::Result;
use vip_core::scheduler::{next_fire_time, parse_schedule};

const RECENT_BACKUPS: usize = 5;

/// 显示配置、下次执行时间和备份文件
pub async fn run_status(app: &CliApp) -> Result<()> {
    info!("⭐ CRCON VIP 备份状态");
    info!("==================");
    info!("📋 基本信息:");
    info!("   版本: {}", version_info::full_version());
    info!("{}", app.config);

    info!("⏰ 下次执行:");
    let now = Utc::now();
    for (label, expression) in [
        ("定时备份", &app.config.backup_cron),
        ("到期检查", &app.config.alert_cron),
    ] {
        let schedule = parse_schedule(expression)?;
        match next_fire_time(&schedule, app.config.timezone, now) {
            Some(next) => info!(
                "   {}: {} ({})",
                label,
                next.with_timezone(&app.config.timezone).format("%Y-%m-%d %H:%M:%S %Z"),
                expression
            ),
            None => warn!("   {}: 没有后续执行时间 ({})", label, expression),
        }
    }

    info!("🔌 CRCON 连接:");
    match app.api_client.test_connection().await {
        Ok(status) => info!("   ✅ {} ({})", status.name, status.players_display()),
        Err(e) => warn!("   ❌ 连接失败: {}", e),
    }

    let backups = app.backup_manager.list_backups().await?;
    info!(
        "📁 备份文件 ({} 个): {}",
        backups.len(),
        app.backup_manager.backup_dir().display()
    );
    if backups.is_empty() {
        info!("   暂无备份");
    }
    for file in backups.iter().take(RECENT_BACKUPS) {
        info!(
            "   {} | {} | {}",
            file.filename,
            format_size(file.size_bytes),
            file.modified.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    if backups.len() > RECENT_BACKUPS {
        info!("   ... 以及另外 {} 个文件", backups.len() - RECENT_BACKUPS);
    }

    Ok(())
}
