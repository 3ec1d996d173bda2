use clap::Parser;
use tracing::error;
use vip_cli::{Cli, CliApp, setup_logging};
use vip_core::VipError;
use vip_core::config::AppConfig;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 设置日志记录，guard 需要保持到进程结束
    let _log_guard = setup_logging(cli.verbose);

    let config = match AppConfig::load(Some(&cli.config)) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ 配置加载失败: {}", e);
            if matches!(e, VipError::MissingCredential) {
                error!("👉 请在 .env 文件或环境变量中设置 CRCON_API_TOKEN");
            }
            std::process::exit(1);
        }
    };

    let app = match CliApp::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("❌ 应用初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run_command(cli.command).await {
        let fatal = e
            .downcast_ref::<VipError>()
            .is_some_and(|err| err.is_fatal());
        if fatal {
            error!("❌ 无法启动: {}", e);
            error!("👉 请检查 BACKUP_CRON / ALERT_CRON 配置");
        } else {
            error!("❌ 操作失败: {}", e);
        }
        std::process::exit(1);
    }
}
