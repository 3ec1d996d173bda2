use crate::constants::{api, backup, config::env, cron, server};
use crate::error::{Result, VipError};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// 应用配置结构
///
/// 启动时加载一次，进程生命周期内不再变化。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// CRCON 基础地址
    pub crcon_url: String,
    /// CRCON API 令牌（Bearer）
    pub api_token: String,
    /// Discord webhook 地址，为空时不发送通知
    pub discord_webhook_url: Option<String>,
    /// 定时备份 cron 表达式
    pub backup_cron: String,
    /// 到期检查 cron 表达式
    pub alert_cron: String,
    /// 备份文件保留天数
    pub retention_days: u32,
    /// 定时任务使用的时区
    pub timezone: Tz,
    /// 健康检查服务端口
    pub port: u16,
    /// 备份目录
    pub backup_dir: PathBuf,
}

/// 配置文件中的可选字段，用于分层合并
#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    pub crcon_url: Option<String>,
    pub crcon_api_token: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub backup_cron: Option<String>,
    pub alert_cron: Option<String>,
    pub backup_retention_days: Option<u32>,
    pub timezone: Option<String>,
    pub port: Option<u16>,
    pub backup_dir: Option<String>,
}

impl PartialConfig {
    /// 从TOML文件读取，文件不存在时返回空配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("配置文件不存在，跳过: {}", path.display());
            return Ok(Self::default());
        }

        tracing::info!("找到配置文件: {}", path.display());
        let content = fs::read_to_string(path)?;
        let partial: PartialConfig = toml::from_str(&content)?;
        Ok(partial)
    }
}

impl AppConfig {
    /// 加载配置：默认值 <- 配置文件 <- .env / 环境变量
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path) => PartialConfig::from_file(path)?,
            None => PartialConfig::default(),
        };

        Self::from_sources(file_config, |key| std::env::var(key).ok())
    }

    /// 合并配置文件与键值查找函数（环境变量优先）
    pub fn from_sources<F>(file: PartialConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空字符串视为未设置
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_token = var(env::CRCON_API_TOKEN)
            .or(file.crcon_api_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or(VipError::MissingCredential)?;

        let crcon_url = var(env::CRCON_URL)
            .or(file.crcon_url)
            .unwrap_or_else(|| api::DEFAULT_BASE_URL.to_string());

        let discord_webhook_url = var(env::DISCORD_WEBHOOK_URL)
            .or(file.discord_webhook_url)
            .filter(|u| !u.trim().is_empty());

        let backup_cron = var(env::BACKUP_CRON)
            .or(file.backup_cron)
            .unwrap_or_else(|| cron::DEFAULT_BACKUP_CRON.to_string());

        let alert_cron = var(env::ALERT_CRON)
            .or(file.alert_cron)
            .unwrap_or_else(|| cron::DEFAULT_ALERT_CRON.to_string());

        let retention_days = match var(env::BACKUP_RETENTION_DAYS) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                VipError::config(format!("{} 无效 '{raw}': {e}", env::BACKUP_RETENTION_DAYS))
            })?,
            None => file
                .backup_retention_days
                .unwrap_or(backup::DEFAULT_RETENTION_DAYS),
        };

        let timezone_name = var(env::TIMEZONE)
            .or_else(|| var(env::TZ))
            .or(file.timezone)
            .unwrap_or_else(|| cron::DEFAULT_TIMEZONE.to_string());
        let timezone = parse_timezone(&timezone_name)?;

        let port = match var(env::PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| VipError::config(format!("{} 无效 '{raw}': {e}", env::PORT)))?,
            None => file.port.unwrap_or(server::DEFAULT_PORT),
        };

        let backup_dir = var(env::BACKUP_DIR)
            .or(file.backup_dir)
            .map(PathBuf::from)
            .unwrap_or_else(backup::get_default_backup_dir);

        Ok(Self {
            crcon_url: crcon_url.trim_end_matches('/').to_string(),
            api_token,
            discord_webhook_url,
            backup_cron,
            alert_cron,
            retention_days,
            timezone,
            port,
            backup_dir,
        })
    }

    /// 时区名称
    pub fn timezone_name(&self) -> &'static str {
        self.timezone.name()
    }

    /// 是否启用了 Discord 通知
    pub fn notifications_enabled(&self) -> bool {
        self.discord_webhook_url.is_some()
    }
}

/// 解析IANA时区名称
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| VipError::config(format!("无效的时区 '{name}': {e}")))
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "当前配置:")?;
        writeln!(f, "  CRCON 地址: {}", self.crcon_url)?;
        writeln!(f, "  API 令牌: {}", mask_token(&self.api_token))?;
        writeln!(
            f,
            "  Discord 通知: {}",
            if self.notifications_enabled() { "已启用" } else { "未配置" }
        )?;
        writeln!(f, "  备份计划: {}", self.backup_cron)?;
        writeln!(f, "  检查计划: {}", self.alert_cron)?;
        writeln!(f, "  时区: {}", self.timezone_name())?;
        writeln!(f, "  保留天数: {}", self.retention_days)?;
        writeln!(f, "  备份目录: {}", self.backup_dir.display())?;
        write!(f, "  健康检查端口: {}", self.port)
    }
}

/// 令牌只显示末尾4位
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_token_only() {
        let config = AppConfig::from_sources(
            PartialConfig::default(),
            lookup_from(&[("CRCON_API_TOKEN", "secret")]),
        )
        .unwrap();

        assert_eq!(config.api_token, "secret");
        assert_eq!(config.crcon_url, api::DEFAULT_BASE_URL);
        assert_eq!(config.backup_cron, "0 2 * * *");
        assert_eq!(config.alert_cron, "0 9 * * *");
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.port, 3000);
        assert!(config.discord_webhook_url.is_none());
        assert!(!config.notifications_enabled());
    }

    #[test]
    fn test_missing_token_fails() {
        let err = AppConfig::from_sources(PartialConfig::default(), lookup_from(&[])).unwrap_err();
        assert!(matches!(err, VipError::MissingCredential));

        // 空字符串同样视为缺失
        let err = AppConfig::from_sources(
            PartialConfig::default(),
            lookup_from(&[("CRCON_API_TOKEN", "  ")]),
        )
        .unwrap_err();
        assert!(matches!(err, VipError::MissingCredential));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = PartialConfig {
            crcon_url: Some("http://file:8010".to_string()),
            crcon_api_token: Some("file-token".to_string()),
            backup_retention_days: Some(10),
            timezone: Some("Asia/Shanghai".to_string()),
            ..Default::default()
        };

        let config = AppConfig::from_sources(
            file,
            lookup_from(&[
                ("CRCON_URL", "http://env:8010/"),
                ("BACKUP_RETENTION_DAYS", "14"),
                ("DISCORD_WEBHOOK_URL", "https://discord.test/hook"),
            ]),
        )
        .unwrap();

        assert_eq!(config.crcon_url, "http://env:8010");
        assert_eq!(config.api_token, "file-token");
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.timezone_name(), "Asia/Shanghai");
        assert_eq!(
            config.discord_webhook_url.as_deref(),
            Some("https://discord.test/hook")
        );
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = AppConfig::from_sources(
            PartialConfig::default(),
            lookup_from(&[("CRCON_API_TOKEN", "t"), ("BACKUP_RETENTION_DAYS", "abc")]),
        )
        .unwrap_err();
        assert!(matches!(err, VipError::Config(_)));

        let err = AppConfig::from_sources(
            PartialConfig::default(),
            lookup_from(&[("CRCON_API_TOKEN", "t"), ("TIMEZONE", "Mars/Olympus")]),
        )
        .unwrap_err();
        assert!(matches!(err, VipError::Config(_)));
    }

    #[test]
    fn test_tz_fallback() {
        let config = AppConfig::from_sources(
            PartialConfig::default(),
            lookup_from(&[("CRCON_API_TOKEN", "t"), ("TZ", "Europe/Berlin")]),
        )
        .unwrap();
        assert_eq!(config.timezone_name(), "Europe/Berlin");
    }

    #[test]
    fn test_partial_config_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "crcon_url = \"http://rcon.example:8010\"\nbackup_cron = \"30 3 * * *\"\nport = 8080\n",
        )
        .unwrap();

        let partial = PartialConfig::from_file(&path).unwrap();
        assert_eq!(partial.crcon_url.as_deref(), Some("http://rcon.example:8010"));
        assert_eq!(partial.backup_cron.as_deref(), Some("30 3 * * *"));
        assert_eq!(partial.port, Some(8080));

        // 不存在的文件返回空配置
        let missing = PartialConfig::from_file(temp_dir.path().join("missing.toml")).unwrap();
        assert!(missing.crcon_url.is_none());
    }

    #[test]
    fn test_display_masks_token() {
        let config = AppConfig::from_sources(
            PartialConfig::default(),
            lookup_from(&[("CRCON_API_TOKEN", "abcdef123456")]),
        )
        .unwrap();
        let text = config.to_string();
        assert!(text.contains("****3456"));
        assert!(!text.contains("abcdef123456"));
    }
}
