use thiserror::Error;

pub type Result<T> = std::result::Result<T, VipError>;

#[derive(Error, Debug)]
pub enum VipError {
    #[error("缺少 CRCON API 令牌 (CRCON_API_TOKEN)")]
    MissingCredential,

    #[error("CRCON 认证失败 (401)，请检查 API 令牌")]
    AuthenticationFailed,

    #[error("CRCON 拒绝访问 (403)，API 令牌权限不足")]
    PermissionDenied,

    #[error("网络请求错误: {0}")]
    Transport(String),

    #[error("CRCON 操作失败: {0}")]
    RemoteOperationFailed(String),

    #[error("无法获取任何 VIP 数据")]
    NoDataAvailable,

    #[error("无效的cron表达式 '{expression}': {reason}")]
    InvalidScheduleExpression { expression: String, reason: String },

    #[error("配置错误: {0}")]
    Config(String),

    #[error("配置文件解析错误: {0}")]
    TomlConfig(#[from] toml::de::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("自定义错误: {0}")]
    Custom(String),
}

// reqwest 的错误全部归为传输错误，状态码映射在 api 模块中单独处理
impl From<reqwest::Error> for VipError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VipError::Transport(format!("请求超时: {err}"))
        } else {
            VipError::Transport(err.to_string())
        }
    }
}

impl VipError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_schedule(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScheduleExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// 致命错误：进程不能带着它启动
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidScheduleExpression { .. })
    }
}
