use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// 是否启用信封模式：完整作业消息经共享缓存跨越内部一跳
    pub envelope: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self { envelope: true }
    }
}
