use async_trait::async_trait;

use crate::errors::RelayResult;

/// 入站组件面向外部调用方的端点
///
/// `receive` 阻塞等待下一条外部消息；若外部协议期待应答，
/// 组件在一轮内部往返后调用 `respond` 送回累积的反馈。
#[async_trait]
pub trait InboundEndpoint: Send + Sync {
    async fn receive(&self) -> RelayResult<Vec<u8>>;

    async fn respond(&self, data: Vec<u8>) -> RelayResult<()>;

    /// 外部协议是否期待应答
    fn expects_reply(&self) -> bool;
}

/// 出站组件面向外部被调方的端点
#[async_trait]
pub trait OutboundEndpoint: Send + Sync {
    /// 向外部投递一条载荷，`Some` 表示外部被调方给出了应答
    async fn deliver(&self, data: Vec<u8>) -> RelayResult<Option<Vec<u8>>>;
}
