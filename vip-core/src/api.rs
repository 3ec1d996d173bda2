use crate::api_config::ApiConfig;
use crate::config::AppConfig;
use crate::constants::api::http;
use crate::error::{Result, VipError};
use crate::models::{ServerStatus, VipRecord};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// CRCON API 客户端
///
/// 每个请求都带 Bearer 令牌和固定超时，不做重试，失败由调用方决定后续动作。
#[derive(Debug, Clone)]
pub struct CrconClient {
    client: Client,
    config: ApiConfig,
    api_token: String,
}

impl CrconClient {
    /// 创建新的 API 客户端
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http::REQUEST_TIMEOUT))
            .user_agent(http::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            config: ApiConfig::with_base_url(base_url),
            api_token: api_token.into(),
        })
    }

    /// 从应用配置创建
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.crcon_url.clone(), config.api_token.clone())
    }

    /// 获取当前API配置
    pub fn get_config(&self) -> &ApiConfig {
        &self.config
    }

    /// 发送请求并解开 CRCON 响应信封
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        payload: Option<&Value>,
    ) -> Result<Value> {
        if self.api_token.trim().is_empty() {
            return Err(VipError::MissingCredential);
        }

        let url = self.config.get_endpoint_url(endpoint);
        debug!(%method, %url, "发送 CRCON 请求");

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token);
        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::UNAUTHORIZED => {
                error!("CRCON 认证失败: {}", url);
                return Err(VipError::AuthenticationFailed);
            }
            StatusCode::FORBIDDEN => {
                error!("CRCON 拒绝访问: {}", url);
                return Err(VipError::PermissionDenied);
            }
            s if !s.is_success() => {
                let text = response.text().await.unwrap_or_default();
                error!("CRCON 请求失败: {} - {}", status, text);
                return Err(VipError::transport(format!("HTTP {status}: {text}")));
            }
            _ => {}
        }

        let body = response.text().await?;
        unwrap_envelope(parse_body(&body))
    }

    /// 获取服务器状态
    pub async fn get_status(&self) -> Result<ServerStatus> {
        let value = self
            .request(&self.config.endpoints.get_status, Method::GET, None)
            .await?;
        ServerStatus::from_value(value)
            .map_err(|e| VipError::transport(format!("服务器状态格式无效: {e}")))
    }

    /// 获取 VIP 列表
    pub async fn get_vip_ids(&self) -> Result<Vec<VipRecord>> {
        let value = self
            .request(&self.config.endpoints.get_vip_ids, Method::GET, None)
            .await?;

        if value.is_null() {
            warn!("CRCON 返回空的 VIP 列表");
            return Ok(Vec::new());
        }

        let vips: Vec<VipRecord> = serde_json::from_value(value)
            .map_err(|e| VipError::transport(format!("VIP 列表格式无效: {e}")))?;
        debug!(count = vips.len(), "获取 VIP 列表成功");
        Ok(vips)
    }

    /// 下载 CRCON 原生的 VIP 导出文本（部分部署不支持）
    pub async fn download_vips(&self) -> Result<String> {
        let value = self
            .request(&self.config.endpoints.download_vips, Method::GET, None)
            .await?;

        let text = match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => serde_json::to_string_pretty(&other)?,
        };
        debug!(bytes = text.len(), "下载 VIP 导出完成");
        Ok(text)
    }

    /// 测试与 CRCON 的连接
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> Result<ServerStatus> {
        match self.get_status().await {
            Ok(status) => {
                info!(
                    server = %status.name,
                    players = %status.players_display(),
                    "CRCON 连接正常"
                );
                Ok(status)
            }
            Err(e) => {
                warn!(error = %e, "CRCON 连接失败");
                Err(e)
            }
        }
    }
}

/// 响应体不是JSON时原样作为字符串返回
pub fn parse_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// 解开 `{ result, failed, error }` 信封
pub fn unwrap_envelope(value: Value) -> Result<Value> {
    match value {
        Value::Object(mut map) if map.contains_key("result") => {
            if is_truthy(map.get("failed")) {
                let message = match map.get("error") {
                    Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
                    Some(v) if is_truthy(Some(v)) => v.to_string(),
                    _ => http::GENERIC_FAILURE_MESSAGE.to_string(),
                };
                return Err(VipError::RemoteOperationFailed(message));
            }
            Ok(map.remove("result").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
