use thiserror::Error;

/// 分发层错误类型定义
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("解码错误: {0}")]
    Decode(String),

    #[error("用户处理器错误: {0}")]
    UserHandler(String),

    #[error("路由错误: {0}")]
    Routing(String),

    #[error("缓存条目缺失: {key}")]
    CacheMiss { key: String },

    #[error("通道错误: {0}")]
    Channel(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type RelayResult<T> = std::result::Result<T, RelayError>;

impl RelayError {
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }
    pub fn user_handler<S: Into<String>>(msg: S) -> Self {
        Self::UserHandler(msg.into())
    }
    pub fn routing<S: Into<String>>(msg: S) -> Self {
        Self::Routing(msg.into())
    }
    pub fn cache_miss<S: Into<String>>(key: S) -> Self {
        Self::CacheMiss { key: key.into() }
    }
    pub fn channel<S: Into<String>>(msg: S) -> Self {
        Self::Channel(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 是否为不可恢复错误（仅启动阶段失败会终止进程）
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Configuration(_))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Decode(e.to_string())
    }
}
