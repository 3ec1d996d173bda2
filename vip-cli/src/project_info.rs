/// 项目信息模块
///
/// 项目元数据统一在这里定义，vip-core 只提供技术性常量

/// 项目元数据（自动从 Cargo.toml 同步）
pub mod metadata {
    pub const PROJECT_NAME: &str = env!("CARGO_PKG_NAME");

    pub const PROJECT_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

    pub const PROJECT_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

    /// 用户友好的显示名称（手动维护，用于 UI 显示）
    pub mod display {
        pub const FRIENDLY_NAME: &str = "CRCON VIP Backup";

        /// 项目详细描述（比 Cargo.toml 中的描述更详细）
        pub const DESCRIPTION_LONG: &str = "定时备份 CRCON 服务器的 VIP 列表，分析 VIP 到期情况并通过 Discord 发送提醒，同时提供 HTTP 健康检查接口";
    }
}

/// 版本信息
pub mod version_info {
    pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// 带名称的版本字符串
    pub fn full_version() -> String {
        format!("{} v{}", super::metadata::PROJECT_NAME, CLI_VERSION)
    }
}
