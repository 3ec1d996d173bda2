/// CRCON API 相关常量
pub mod api {
    /// 默认 CRCON 地址
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8010";

    /// API端点路径
    pub mod endpoints {
        /// 服务器状态
        pub const GET_STATUS: &str = "/api/get_status";

        /// VIP 列表（JSON）
        pub const GET_VIP_IDS: &str = "/api/get_vip_ids";

        /// VIP 导出文件（纯文本，部分部署不支持）
        pub const DOWNLOAD_VIPS: &str = "/api/download_vips";
    }

    /// HTTP相关常量
    pub mod http {
        /// 单次请求超时时间（秒）
        pub const REQUEST_TIMEOUT: u64 = 15;

        /// User-Agent头
        pub const USER_AGENT: &str = concat!("vip-cli/", env!("CARGO_PKG_VERSION"));

        /// 信封中缺少错误信息时使用的提示
        pub const GENERIC_FAILURE_MESSAGE: &str = "CRCON 返回失败但未提供错误信息";
    }
}

/// 玩家平台识别前缀
pub mod platform {
    /// PC (Steam) 玩家 ID 前缀
    pub const PC_PREFIX: &str = "76561198";

    /// 主机玩家 ID 前缀
    pub const CONSOLE_PREFIX: &str = "11000";

    /// 主机玩家 ID 的另一种前缀
    pub const CONSOLE_ALT_PREFIX: &str = "10000000";
}

/// VIP 到期分析相关常量
pub mod analysis {
    /// "即将到期" 的最大天数（含）
    pub const EXPIRING_SOON_DAYS: i64 = 7;

    /// 表示永久 VIP 的过期时间占位值
    pub const PERMANENT_SENTINEL: &str = "None";

    /// 一天的毫秒数
    pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;
}

/// 备份相关常量
pub mod backup {
    use std::path::{Path, PathBuf};

    /// 备份目录名
    pub const BACKUP_DIR_NAME: &str = "backups";

    /// 备份文件前缀
    pub const BACKUP_PREFIX: &str = "vip_backup";

    /// 分析报告文件前缀
    pub const REPORT_PREFIX: &str = "vip_analysis";

    /// 备份文件扩展名
    pub const BACKUP_EXTENSION: &str = ".txt";

    /// 默认保留天数
    pub const DEFAULT_RETENTION_DAYS: u32 = 30;

    /// 导出格式中永久 VIP 的标记
    pub const PERMANENT_LABEL: &str = "permanent";

    /// 获取默认备份目录路径（跨平台）
    pub fn get_default_backup_dir() -> PathBuf {
        Path::new(".").join(BACKUP_DIR_NAME)
    }
}

/// Cron任务相关常量
pub mod cron {
    /// 默认自动备份cron表达式（每天凌晨2点）
    pub const DEFAULT_BACKUP_CRON: &str = "0 2 * * *";

    /// 默认到期检查cron表达式（每天早上9点）
    pub const DEFAULT_ALERT_CRON: &str = "0 9 * * *";

    /// 标准Cron表达式字段数量（分 时 日 月 周）
    pub const CRON_FIELDS_COUNT: usize = 5;

    /// 默认时区
    pub const DEFAULT_TIMEZONE: &str = "UTC";
}

/// 超时时间常量（秒）
pub mod timeout {
    /// 启动后首次健康检查的延迟，避免与进程初始化竞争
    pub const INITIAL_HEALTH_CHECK_DELAY: u64 = 30;
}

/// 健康检查服务相关常量
pub mod server {
    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 3000;

    /// 所有网络接口地址
    pub const ALL_INTERFACES: &str = "0.0.0.0";
}

/// Discord 通知相关常量
pub mod notification {
    /// 成功消息颜色
    pub const COLOR_SUCCESS: u32 = 0x00ff00;

    /// 失败消息颜色
    pub const COLOR_ERROR: u32 = 0xff0000;

    /// 警告消息颜色
    pub const COLOR_WARNING: u32 = 0xffaa00;

    /// 普通信息颜色
    pub const COLOR_INFO: u32 = 0x0099ff;

    /// Discord embed description 的最大长度
    pub const MAX_DESCRIPTION_LEN: usize = 4096;

    /// 消息页脚
    pub const FOOTER_TEXT: &str = "CRCON VIP Backup";
}

/// 应用配置相关常量
pub mod config {
    /// 默认配置文件名
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// 环境变量名
    pub mod env {
        pub const CRCON_URL: &str = "CRCON_URL";
        pub const CRCON_API_TOKEN: &str = "CRCON_API_TOKEN";
        pub const DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
        pub const BACKUP_CRON: &str = "BACKUP_CRON";
        pub const ALERT_CRON: &str = "ALERT_CRON";
        pub const BACKUP_RETENTION_DAYS: &str = "BACKUP_RETENTION_DAYS";
        pub const TIMEZONE: &str = "TIMEZONE";
        pub const TZ: &str = "TZ";
        pub const PORT: &str = "PORT";
        pub const BACKUP_DIR: &str = "BACKUP_DIR";
    }
}
