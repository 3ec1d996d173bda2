use crate::app::CliApp;
use crate::health_server::{self, HealthState};
use crate::utils::format_uptime;
use tracing::{info, warn};
use vip_core::constants::server;
use vip_core::notifier::{Notification, Notifier};
use vip_core::scheduler::Scheduler;

/// 启动调度器和健康检查服务，收到 Ctrl-C / SIGTERM 后优雅退出
pub async fn run_start(app: &CliApp) -> anyhow::Result<()> {
    info!("🚀 启动 CRCON VIP 备份服务");
    info!("{}", app.config);

    let scheduler = Scheduler::new(app.config.clone(), app.tasks.clone());
    scheduler.start().await?;

    let bind = format!("{}:{}", server::ALL_INTERFACES, app.config.port);
    let served = health_server::serve(
        HealthState::new(scheduler.clone()),
        &bind,
        shutdown_signal(),
    )
    .await;

    let uptime = scheduler.status().await.uptime_secs.unwrap_or_default();
    scheduler.stop().await;

    app.notifier
        .notify(Notification::warning(
            "🛑 VIP 备份服务已停止",
            format!("运行时间: {}", format_uptime(uptime)),
        ))
        .await;
    info!("👋 服务已停止");

    served
}

/// 等待 Ctrl-C 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "无法监听 Ctrl-C 信号");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "无法监听 SIGTERM 信号");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到 Ctrl-C，正在停止服务..."),
        _ = terminate => info!("收到 SIGTERM，正在停止服务..."),
    }
}
