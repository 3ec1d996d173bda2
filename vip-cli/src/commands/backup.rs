use crate::app::CliApp;
use crate::utils::format_size;
use tracing::info;
use vip_core::error::Result;

/// 立即下载一次 VIP 备份
pub async fn run_download(app: &CliApp) -> Result<()> {
    info!("📥 下载 VIP 备份...");

    let snapshot = app.backup_manager.download_snapshot().await?;

    info!("✅ 备份完成");
    info!("   文件: {}", snapshot.filepath.display());
    info!("   大小: {}", format_size(snapshot.size_bytes));
    info!("   来源: {}", snapshot.source.display_name());
    Ok(())
}

/// 清理过期备份，未指定天数时使用配置中的保留天数
pub async fn run_cleanup(app: &CliApp, days: Option<u32>) -> Result<()> {
    let retention_days = days.unwrap_or(app.config.retention_days);
    info!(
        "🗑️  清理 {} 天前的备份: {}",
        retention_days,
        app.backup_manager.backup_dir().display()
    );

    let deleted = app.backup_manager.cleanup(retention_days).await;
    if deleted == 0 {
        info!("   没有需要清理的备份");
    } else {
        info!("   ✅ 已删除 {} 个旧备份", deleted);
    }
    Ok(())
}
