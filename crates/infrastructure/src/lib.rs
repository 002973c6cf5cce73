//! # 基础设施实现
//!
//! 核心抽象的进程内实现：共享缓存与通道端点。
//! 真实部署中外部传输由各自的适配器提供，此处的实现用于
//! 单进程集群、测试与演示。

pub mod channel_endpoint;
pub mod memory_cache;

pub use channel_endpoint::{
    inbound_pair, outbound_pair, outbound_with_replies, ChannelClient, ChannelInbound,
    ChannelOutbound, ExternalRequest,
};
pub use memory_cache::MemoryCache;
