use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// 基础重发周期，也是自适应调整的下限
    pub flush_interval: Duration,
    /// 目标冗余比：认为仍在途的消息占已派发消息的比例
    pub target_redundancy: f64,
    /// 重发周期的可选上限
    pub max_flush_interval: Option<Duration>,
    /// 控制通道容量
    pub control_channel_capacity: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            target_redundancy: 0.01,
            max_flush_interval: Some(Duration::from_secs(60)),
            control_channel_capacity: 64,
        }
    }
}

impl ResilienceConfig {
    /// 将一次调整后的周期收敛到 [下限, 上限] 区间
    pub fn clamp_interval(&self, next: Duration) -> Duration {
        let mut next = next.max(self.flush_interval);
        if let Some(max) = self.max_flush_interval {
            next = next.min(max);
        }
        next
    }
}
