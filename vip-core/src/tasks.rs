//! 定时任务的具体操作：定时备份与健康检查
//!
//! 两个操作都有各自的失败边界：任何错误（包括 panic）都只会变成一条日志和一条通知，
//! 不会传播到调度器。两个操作共享同一把锁，不会同时执行。

use crate::{
    Result,
    analyzer::{self, AnalysisResult},
    api::CrconClient,
    backup::{BackupManager, BackupSnapshot},
    models::ServerStatus,
    notifier::{Notification, Notifier},
};
use chrono::Utc;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// 定时任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Backup,
    HealthCheck,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Backup => write!(f, "定时备份"),
            TaskKind::HealthCheck => write!(f, "健康检查"),
        }
    }
}

/// 定时备份的结果
#[derive(Debug, Clone)]
pub struct BackupSummary {
    pub snapshot: BackupSnapshot,
    pub analysis: AnalysisResult,
    pub report_path: PathBuf,
    pub deleted: usize,
}

/// 健康检查的结果
#[derive(Debug, Clone)]
pub struct HealthCheckOutcome {
    pub status: ServerStatus,
    pub analysis: AnalysisResult,
    /// 是否需要发送到期提醒
    pub alerted: bool,
}

/// 备份和健康检查的执行者
pub struct VipTasks {
    api: CrconClient,
    backup: BackupManager,
    notifier: Arc<dyn Notifier>,
    retention_days: u32,
    operation_lock: Mutex<()>,
}

impl VipTasks {
    pub fn new(
        api: CrconClient,
        backup: BackupManager,
        notifier: Arc<dyn Notifier>,
        retention_days: u32,
    ) -> Self {
        Self {
            api,
            backup,
            notifier,
            retention_days,
            operation_lock: Mutex::new(()),
        }
    }

    pub fn api(&self) -> &CrconClient {
        &self.api
    }

    pub fn backup_manager(&self) -> &BackupManager {
        &self.backup
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// 获取 VIP 列表、分析并写入报告
    pub async fn analyze_vips(&self) -> Result<(AnalysisResult, PathBuf)> {
        let vips = self.api.get_vip_ids().await?;
        let result = analyzer::analyze(&vips, Utc::now());
        let report_path = self.backup.write_report(&result).await?;
        Ok((result, report_path))
    }

    /// 备份流程：下载快照 -> 分析 -> 清理旧文件
    ///
    /// 下载或分析失败时直接返回错误，后续步骤不再执行。
    pub async fn run_backup(&self) -> Result<BackupSummary> {
        let snapshot = self.backup.download_snapshot().await?;
        let (analysis, report_path) = self.analyze_vips().await?;
        let deleted = self.backup.cleanup(self.retention_days).await;

        Ok(BackupSummary {
            snapshot,
            analysis,
            report_path,
            deleted,
        })
    }

    /// 健康检查：测试连接并分析到期情况
    ///
    /// 只负责判断，到期提醒由 [`VipTasks::health_check`] 在释放锁之后发送。
    pub async fn run_health_check(&self) -> Result<HealthCheckOutcome> {
        let status = self.api.test_connection().await?;
        let vips = self.api.get_vip_ids().await?;
        let analysis = analyzer::analyze(&vips, Utc::now());

        let alerted = analysis.has_issues();
        if alerted {
            warn!(
                expired = analysis.expired,
                expiring_today = analysis.expiring_today,
                expiring_soon = analysis.expiring_soon,
                "发现即将到期或已过期的VIP"
            );
        } else {
            info!(total = analysis.total, "VIP 状态正常");
        }

        Ok(HealthCheckOutcome {
            status,
            analysis,
            alerted,
        })
    }

    /// 定时备份（带失败边界）
    #[instrument(skip(self))]
    pub async fn scheduled_backup(&self) -> Option<BackupSummary> {
        let result = {
            let _guard = self.operation_lock.lock().await;
            info!("开始定时备份");
            self.run_backup().await
        };

        // 锁已释放，通知变慢不会阻塞下一次操作
        match result {
            Ok(summary) => {
                info!(
                    file = %summary.snapshot.filename,
                    vips = summary.analysis.total,
                    deleted = summary.deleted,
                    "定时备份完成"
                );
                self.notifier.notify(backup_success(&summary)).await;
                Some(summary)
            }
            Err(e) => {
                error!(error = %e, "定时备份失败");
                self.notifier
                    .notify(Notification::error("❌ VIP 备份失败", e.to_string()))
                    .await;
                None
            }
        }
    }

    /// 健康检查（带失败边界），没有问题时不发送通知
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Option<HealthCheckOutcome> {
        let result = {
            let _guard = self.operation_lock.lock().await;
            info!("开始健康检查");
            self.run_health_check().await
        };

        match result {
            Ok(outcome) => {
                if outcome.alerted {
                    self.notifier.notify(expiry_alert(&outcome.analysis)).await;
                }
                Some(outcome)
            }
            Err(e) => {
                error!(error = %e, "健康检查失败");
                self.notifier
                    .notify(Notification::error("❌ 健康检查失败", e.to_string()))
                    .await;
                None
            }
        }
    }

    /// 在独立任务中执行一次操作，panic 也会被转换为通知
    pub async fn dispatch(self: Arc<Self>, kind: TaskKind) {
        let tasks = self.clone();
        let handle = tokio::spawn(async move {
            match kind {
                TaskKind::Backup => {
                    tasks.scheduled_backup().await;
                }
                TaskKind::HealthCheck => {
                    tasks.health_check().await;
                }
            }
        });

        if let Err(e) = handle.await {
            error!(task = %kind, error = %e, "定时任务异常终止");
            self.notifier
                .notify(Notification::error(
                    format!("❌ {kind}异常终止"),
                    e.to_string(),
                ))
                .await;
        }
    }
}

fn backup_success(summary: &BackupSummary) -> Notification {
    let description = format!(
        "📁 文件: {} ({} 字节, {})\n👥 VIP 数量: {}\n🗑️ 清理旧备份: {} 个",
        summary.snapshot.filename,
        summary.snapshot.size_bytes,
        summary.snapshot.source.display_name(),
        summary.analysis.total,
        summary.deleted
    );
    Notification::success("✅ VIP 备份完成", description)
}

fn expiry_alert(analysis: &AnalysisResult) -> Notification {
    let mut lines = analysis.issue_summary();
    lines.push(String::new());
    lines.extend(analysis.alert_lines());
    Notification::warning("⚠️ VIP 到期提醒", lines.join("\n"))
}
