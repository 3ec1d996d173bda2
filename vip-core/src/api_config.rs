//! API配置模块 - CRCON 端点配置

use crate::constants::api;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API端点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoints {
    /// 服务器状态端点
    pub get_status: String,
    /// VIP 列表端点
    pub get_vip_ids: String,
    /// VIP 导出端点
    pub download_vips: String,
}

/// API配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 基础URL
    pub base_url: String,
    /// API端点
    pub endpoints: ApiEndpoints,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::with_base_url(api::DEFAULT_BASE_URL)
    }
}

impl ApiConfig {
    /// 使用指定的基础地址创建配置
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints: ApiEndpoints {
                get_status: api::endpoints::GET_STATUS.to_string(),
                get_vip_ids: api::endpoints::GET_VIP_IDS.to_string(),
                download_vips: api::endpoints::DOWNLOAD_VIPS.to_string(),
            },
        }
    }

    /// 获取完整的端点URL
    pub fn get_endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// 获取所有端点信息，用于CLI显示
    pub fn get_endpoints_info(&self) -> Vec<(&str, String)> {
        vec![
            ("服务器地址", self.base_url.clone()),
            ("服务器状态", self.get_endpoint_url(&self.endpoints.get_status)),
            ("VIP 列表", self.get_endpoint_url(&self.endpoints.get_vip_ids)),
            ("VIP 导出", self.get_endpoint_url(&self.endpoints.download_vips)),
        ]
    }
}

impl fmt::Display for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "当前API配置:")?;
        for (name, url) in self.get_endpoints_info() {
            writeln!(f, "  {name}: {url}")?;
        }
        Ok(())
    }
}
