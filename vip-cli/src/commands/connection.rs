use crate::app::CliApp;
use tracing::{info, warn};
use vip_core::error::Result;
use vip_core::notifier::Notification;

/// 测试 CRCON 连接，配置了 webhook 时同时发送一条测试通知
pub async fn run_test(app: &CliApp) -> Result<()> {
    info!("🔍 测试 CRCON 连接");
    info!("==================");
    info!("{}", app.api_client.get_config());

    let status = app.api_client.test_connection().await?;
    info!("   ✅ 服务器: {}", status.name);
    info!("   👥 玩家: {}", status.players_display());
    if let Some(map) = &status.map {
        info!("   🗺️  地图: {}", map);
    }

    let vips = app.api_client.get_vip_ids().await?;
    info!("   ⭐ VIP 数量: {}", vips.len());

    if app.notifier.is_enabled() {
        info!("📨 发送 Discord 测试通知...");
        let notification = Notification::info(
            "🧪 测试通知",
            format!(
                "CRCON 连接正常\n🖥️ 服务器: {}\n👥 玩家: {}\n⭐ VIP 数量: {}",
                status.name,
                status.players_display(),
                vips.len()
            ),
        );
        app.notifier.send(&notification).await?;
        info!("   ✅ Discord 通知发送成功");
    } else {
        warn!("   ⚠️  未配置 DISCORD_WEBHOOK_URL，跳过通知测试");
    }

    Ok(())
}
