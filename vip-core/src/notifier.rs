use crate::config::AppConfig;
use crate::constants::{api::http, notification};
use crate::error::{Result, VipError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

/// 通知级别，决定 embed 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationLevel {
    pub fn color(&self) -> u32 {
        match self {
            NotificationLevel::Success => notification::COLOR_SUCCESS,
            NotificationLevel::Error => notification::COLOR_ERROR,
            NotificationLevel::Warning => notification::COLOR_WARNING,
            NotificationLevel::Info => notification::COLOR_INFO,
        }
    }
}

/// 一条待发送的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn new(
        level: NotificationLevel,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, title, description)
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, title, description)
    }
}

/// 通知发送方
///
/// 实现者自行处理发送失败（记录日志），调用方不关心结果。
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Discord webhook 通知
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl DiscordNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
            timeout: Duration::from_secs(http::REQUEST_TIMEOUT),
        }
    }

    /// 修改单次发送的超时时间
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.discord_webhook_url.clone())
    }

    /// 是否配置了 webhook
    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// 发送通知，返回发送错误
    pub async fn send(&self, notification: &Notification) -> Result<()> {
        let Some(url) = self.webhook_url.as_deref() else {
            return Ok(());
        };

        let payload = build_embed_payload(notification, Utc::now());
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取响应内容".to_string());
            return Err(VipError::transport(format!(
                "Discord webhook 返回 {status}: {body}"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, notification: Notification) {
        if !self.is_enabled() {
            debug!(title = %notification.title, "未配置 Discord webhook，跳过通知");
            return;
        }

        match self.send(&notification).await {
            Ok(()) => debug!(title = %notification.title, "Discord 通知已发送"),
            Err(e) => warn!(error = %e, title = %notification.title, "Discord 通知发送失败"),
        }
    }
}

/// 构造 Discord embed 消息体
pub fn build_embed_payload(notification: &Notification, timestamp: DateTime<Utc>) -> Value {
    json!({
        "embeds": [{
            "title": notification.title,
            "description": truncate_description(&notification.description),
            "color": notification.level.color(),
            "timestamp": timestamp.to_rfc3339(),
            "footer": { "text": notification::FOOTER_TEXT }
        }]
    })
}

/// 超过 Discord 限制时截断
fn truncate_description(text: &str) -> String {
    if text.chars().count() <= notification::MAX_DESCRIPTION_LEN {
        return text.to_string();
    }
    let mut truncated: String = text
        .chars()
        .take(notification::MAX_DESCRIPTION_LEN - 3)
        .collect();
    truncated.push_str("...");
    truncated
}
