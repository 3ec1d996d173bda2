use crate::{
    Result, VipError,
    analyzer::{AnalysisResult, parse_expiration},
    api::CrconClient,
    constants::{analysis, backup},
    models::VipRecord,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// 备份管理器
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    api: CrconClient,
}

/// 备份内容来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    /// CRCON 原生导出
    Export,
    /// 根据 VIP 列表本地生成
    Fallback,
}

impl SnapshotSource {
    pub fn display_name(&self) -> &'static str {
        match self {
            SnapshotSource::Export => "CRCON 导出",
            SnapshotSource::Fallback => "本地生成",
        }
    }
}

/// 一次备份的结果
#[derive(Debug, Clone, Serialize)]
pub struct BackupSnapshot {
    pub filepath: PathBuf,
    pub filename: String,
    pub size_bytes: u64,
    pub source: SnapshotSource,
}

/// 备份目录中的文件信息
#[derive(Debug, Clone, Serialize)]
pub struct BackupFileInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

/// 清理时单个文件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted,
    Kept,
    Skipped(String),
}

impl BackupManager {
    /// 创建新的备份管理器（目录在首次写入时创建）
    pub fn new(backup_dir: PathBuf, api: CrconClient) -> Self {
        Self { backup_dir, api }
    }

    /// 获取备份目录
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// 下载 VIP 快照并写入备份目录
    ///
    /// 优先使用 CRCON 原生导出，失败或为空时根据 VIP 列表生成导出格式。
    #[instrument(skip(self))]
    pub async fn download_snapshot(&self) -> Result<BackupSnapshot> {
        let (content, source) = self.fetch_payload().await?;

        let (filepath, filename, size_bytes) = self
            .write_timestamped(backup::BACKUP_PREFIX, &content, Utc::now())
            .await?;

        info!(
            file = %filepath.display(),
            size_bytes,
            source = source.display_name(),
            "VIP 备份已保存"
        );

        Ok(BackupSnapshot {
            filepath,
            filename,
            size_bytes,
            source,
        })
    }

    /// 获取备份内容：原生导出 -> 本地生成
    async fn fetch_payload(&self) -> Result<(String, SnapshotSource)> {
        match self.api.download_vips().await {
            Ok(text) if !text.trim().is_empty() => return Ok((text, SnapshotSource::Export)),
            Ok(_) => warn!("CRCON 导出内容为空，改用 VIP 列表生成备份"),
            Err(e) => warn!(error = %e, "CRCON 导出不可用，改用 VIP 列表生成备份"),
        }

        match self.api.get_vip_ids().await {
            Ok(vips) if !vips.is_empty() => {
                let content = format_fallback_export(&vips, Utc::now());
                Ok((content, SnapshotSource::Fallback))
            }
            Ok(_) => {
                warn!("VIP 列表为空");
                Err(VipError::NoDataAvailable)
            }
            Err(e) => {
                warn!(error = %e, "获取 VIP 列表失败");
                Err(VipError::NoDataAvailable)
            }
        }
    }

    /// 将分析结果写入报告文件
    pub async fn write_report(&self, result: &AnalysisResult) -> Result<PathBuf> {
        let (path, _, _) = self
            .write_timestamped(backup::REPORT_PREFIX, &result.render_report(), result.analyzed_at)
            .await?;
        info!(file = %path.display(), "分析报告已保存");
        Ok(path)
    }

    /// 写入带时间戳的文件，返回 (路径, 文件名, 字节数)
    async fn write_timestamped(
        &self,
        prefix: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<(PathBuf, String, u64)> {
        tokio::fs::create_dir_all(&self.backup_dir).await?;

        let filename = timestamped_filename(prefix, at);
        let filepath = self.backup_dir.join(&filename);
        tokio::fs::write(&filepath, content.as_bytes()).await?;

        Ok((filepath, filename, content.len() as u64))
    }

    /// 删除超过保留天数的备份文件，返回删除数量
    ///
    /// 目录不存在或无法读取时视为空目录；单个文件失败时跳过，不会中断整个清理。
    #[instrument(skip(self))]
    pub async fn cleanup(&self, retention_days: u32) -> usize {
        let retention = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
        let cutoff = SystemTime::now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let dir = self.backup_dir.clone();

        let deleted = tokio::task::spawn_blocking(move || sweep_directory(&dir, cutoff)).await;

        match deleted {
            Ok(count) => {
                info!(deleted = count, retention_days, "旧备份清理完成");
                count
            }
            Err(e) => {
                warn!(error = %e, "清理任务异常结束");
                0
            }
        }
    }

    /// 列出备份目录中的文件（按修改时间倒序）
    pub async fn list_backups(&self) -> Result<Vec<BackupFileInfo>> {
        let dir = self.backup_dir.clone();

        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).into_iter().flatten() {
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(metadata) = entry.metadata() {
                    let modified = metadata
                        .modified()
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now());
                    files.push(BackupFileInfo {
                        filename: entry.file_name().to_string_lossy().to_string(),
                        path: entry.path().to_path_buf(),
                        size_bytes: metadata.len(),
                        modified,
                    });
                }
            }
            files.sort_by(|a, b| b.modified.cmp(&a.modified));
            files
        })
        .await?;

        Ok(files)
    }
}

/// 遍历目录并删除早于 cutoff 的文件
fn sweep_directory(dir: &Path, cutoff: SystemTime) -> usize {
    let mut deleted = 0;

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        // 目录不存在或无法读取时 walkdir 返回错误，直接跳过
        let Ok(entry) = entry else { continue };

        match cleanup_entry(entry.path(), cutoff) {
            CleanupOutcome::Deleted => {
                debug!(file = %entry.path().display(), "删除过期备份");
                deleted += 1;
            }
            CleanupOutcome::Kept => {}
            CleanupOutcome::Skipped(reason) => {
                debug!(file = %entry.path().display(), %reason, "跳过文件");
            }
        }
    }

    deleted
}

/// 处理单个文件
fn cleanup_entry(path: &Path, cutoff: SystemTime) -> CleanupOutcome {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => return CleanupOutcome::Skipped(e.to_string()),
    };
    if !metadata.is_file() {
        return CleanupOutcome::Kept;
    }

    let modified = match metadata.modified() {
        Ok(m) => m,
        Err(e) => return CleanupOutcome::Skipped(e.to_string()),
    };
    if modified >= cutoff {
        return CleanupOutcome::Kept;
    }

    match std::fs::remove_file(path) {
        Ok(()) => CleanupOutcome::Deleted,
        Err(e) => CleanupOutcome::Skipped(e.to_string()),
    }
}

/// 生成 `<prefix>_<ISO时间戳>.txt`，时间戳中的冒号和点替换为短横线
pub fn timestamped_filename(prefix: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}{}",
        prefix,
        at.format("%Y-%m-%dT%H-%M-%S-%3fZ"),
        backup::BACKUP_EXTENSION
    )
}

/// 根据 VIP 列表生成导出格式的文本
pub fn format_fallback_export(vips: &[VipRecord], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("# CRCON VIP export (fallback)\n");
    out.push_str(&format!("# Generated: {}\n", generated_at.to_rfc3339()));
    out.push_str(&format!("# Total VIPs: {}\n", vips.len()));

    for vip in vips {
        out.push_str(&format_export_line(vip));
        out.push('\n');
    }
    out
}

/// `<player_id> # <name> (<过期时间或 permanent>)[ - <描述>]`
pub fn format_export_line(vip: &VipRecord) -> String {
    let expiration = match vip.expiration.as_deref().map(str::trim) {
        None | Some("") => backup::PERMANENT_LABEL,
        Some(raw) if raw == analysis::PERMANENT_SENTINEL => backup::PERMANENT_LABEL,
        Some(raw) => raw,
    };

    let mut line = format!("{} # {} ({})", vip.player_id, vip.name, expiration);
    if let Some(desc) = vip.description.as_deref().filter(|d| !d.trim().is_empty()) {
        line.push_str(" - ");
        line.push_str(desc);
    }
    line
}

static EXPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>\S+) # (?P<name>.*?) \((?P<exp>[^()]*)\)(?: - (?P<desc>.*))?$")
        .expect("导出行正则表达式无效")
});

/// 解析导出文本，跳过注释与空行
///
/// 无法识别格式的行只取第一个字段作为玩家ID，其余作为名称。
pub fn parse_export(content: &str) -> Vec<VipRecord> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(parse_export_line)
        .collect()
}

fn parse_export_line(line: &str) -> VipRecord {
    if let Some(caps) = EXPORT_LINE.captures(line) {
        let exp = caps["exp"].trim();
        let expiration = if exp == backup::PERMANENT_LABEL || parse_expiration(Some(exp)).is_none()
        {
            None
        } else {
            Some(exp.to_string())
        };

        return VipRecord {
            player_id: caps["id"].to_string(),
            name: caps["name"].to_string(),
            expiration,
            description: caps.name("desc").map(|m| m.as_str().to_string()),
        };
    }

    debug!(%line, "未知的导出行格式");
    let mut parts = line.splitn(2, char::is_whitespace);
    let player_id = parts.next().unwrap_or_default().to_string();
    let name = parts.next().unwrap_or_default().trim().to_string();
    VipRecord::new(player_id, name)
}
