use crate::cli::Commands;
use crate::commands;
use std::sync::Arc;
use vip_core::{
    api::CrconClient, backup::BackupManager, config::AppConfig, error::Result,
    notifier::DiscordNotifier, tasks::VipTasks,
};

#[derive(Clone)]
pub struct CliApp {
    pub config: AppConfig,
    pub api_client: CrconClient,
    pub backup_manager: BackupManager,
    pub notifier: Arc<DiscordNotifier>,
    pub tasks: Arc<VipTasks>,
}

impl CliApp {
    /// 根据配置创建各组件
    pub fn new(config: AppConfig) -> Result<Self> {
        let api_client = CrconClient::from_config(&config)?;
        let backup_manager = BackupManager::new(config.backup_dir.clone(), api_client.clone());
        let notifier = Arc::new(DiscordNotifier::from_config(&config));

        let tasks = Arc::new(VipTasks::new(
            api_client.clone(),
            backup_manager.clone(),
            notifier.clone(),
            config.retention_days,
        ));

        Ok(Self {
            config,
            api_client,
            backup_manager,
            notifier,
            tasks,
        })
    }

    /// 运行应用命令
    pub async fn run_command(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Test => commands::run_test(self).await?,
            Commands::Download => commands::run_download(self).await?,
            Commands::Analyze { file } => commands::run_analyze(self, file.as_deref()).await?,
            Commands::Cleanup { days } => commands::run_cleanup(self, days).await?,
            Commands::Start => commands::run_start(self).await?,
            Commands::Status => commands::run_status(self).await?,
        }
        Ok(())
    }
}
