use tracing_subscriber::EnvFilter;

use crate::errors::{RelayError, RelayResult};

/// 初始化全局日志订阅器
///
/// 优先读取 `RUST_LOG` 环境变量，未设置时使用传入的默认级别。
pub fn init_logging(default_level: &str) -> RelayResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| RelayError::config_error(format!("日志初始化失败: {e}")))
}
