use serde::{Deserialize, Serialize};

/// 缓冲代理的最小缓冲容量，配置更小的值会被抬升到此下限
pub const MIN_BUFFER_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// 所有目的地合计的缓冲消息上限
    pub max_buffer_size: usize,
    /// 入站请求通道容量
    pub request_channel_capacity: usize,
    /// 每个出站组件专属通道的容量
    pub delivery_channel_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 1000,
            request_channel_capacity: 64,
            delivery_channel_capacity: 16,
        }
    }
}

impl BrokerConfig {
    /// 实际生效的缓冲上限（下限钳制到 [`MIN_BUFFER_SIZE`]）
    pub fn effective_buffer_size(&self) -> usize {
        self.max_buffer_size.max(MIN_BUFFER_SIZE)
    }

    /// 恢复入站轮询的水位：生效上限的10%
    pub fn resume_threshold(&self) -> usize {
        self.effective_buffer_size() / 10
    }
}
