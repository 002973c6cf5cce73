use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::warn;

use relay_core::{InboundEndpoint, OutboundEndpoint, RelayError, RelayResult};

/// 一条来自外部调用方的请求
#[derive(Debug)]
pub struct ExternalRequest {
    pub payload: Vec<u8>,
    /// 调用方期待应答时携带
    pub reply: Option<oneshot::Sender<Vec<u8>>>,
}

/// 外部调用方句柄：向通道端点推送或调用
#[derive(Debug, Clone)]
pub struct ChannelClient {
    tx: mpsc::Sender<ExternalRequest>,
}

impl ChannelClient {
    /// 推送一条消息，不等待应答
    pub async fn push(&self, payload: Vec<u8>) -> RelayResult<()> {
        self.tx
            .send(ExternalRequest {
                payload,
                reply: None,
            })
            .await
            .map_err(|_| RelayError::channel("入站端点已关闭"))
    }

    /// 发出一条请求并阻塞等待应答
    pub async fn call(&self, payload: Vec<u8>) -> RelayResult<Vec<u8>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ExternalRequest {
                payload,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| RelayError::channel("入站端点已关闭"))?;
        reply_rx
            .await
            .map_err(|_| RelayError::channel("入站端点丢弃了应答"))
    }
}

/// 基于Tokio通道的入站端点
///
/// 在测试和演示中代替真实外部传输；`receive`/`respond` 的节奏与
/// 真实的请求/应答传输一致。
pub struct ChannelInbound {
    rx: Mutex<mpsc::Receiver<ExternalRequest>>,
    pending: Mutex<Option<oneshot::Sender<Vec<u8>>>>,
    expects_reply: bool,
}

/// 构造一对相互连接的外部客户端和入站端点
pub fn inbound_pair(expects_reply: bool, capacity: usize) -> (ChannelClient, ChannelInbound) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        ChannelClient { tx },
        ChannelInbound {
            rx: Mutex::new(rx),
            pending: Mutex::new(None),
            expects_reply,
        },
    )
}

#[async_trait]
impl InboundEndpoint for ChannelInbound {
    async fn receive(&self) -> RelayResult<Vec<u8>> {
        let request = self
            .rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| RelayError::channel("外部调用方已断开"))?;
        *self.pending.lock().await = request.reply;
        Ok(request.payload)
    }

    async fn respond(&self, data: Vec<u8>) -> RelayResult<()> {
        match self.pending.lock().await.take() {
            Some(reply) => reply
                .send(data)
                .map_err(|_| RelayError::channel("外部调用方不再等待应答")),
            None => {
                warn!("没有待应答的外部请求，丢弃应答");
                Ok(())
            }
        }
    }

    fn expects_reply(&self) -> bool {
        self.expects_reply
    }
}

/// 基于Tokio通道的出站端点
///
/// 投递的载荷出现在观察端接收通道上；配置了应答通道时，
/// `deliver` 会阻塞等待外部被调方送回一条应答。
pub struct ChannelOutbound {
    tx: mpsc::Sender<Vec<u8>>,
    replies: Option<Mutex<mpsc::Receiver<Vec<u8>>>>,
}

/// 构造一个单向出站端点和它的观察端
pub fn outbound_pair(capacity: usize) -> (ChannelOutbound, mpsc::Receiver<Vec<u8>>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        ChannelOutbound { tx, replies: None },
        rx,
    )
}

/// 构造一个带应答通道的出站端点：观察端消费载荷后经应答发送端回话
pub fn outbound_with_replies(
    capacity: usize,
) -> (ChannelOutbound, mpsc::Receiver<Vec<u8>>, mpsc::Sender<Vec<u8>>) {
    let (tx, rx) = mpsc::channel(capacity);
    let (reply_tx, reply_rx) = mpsc::channel(capacity);
    (
        ChannelOutbound {
            tx,
            replies: Some(Mutex::new(reply_rx)),
        },
        rx,
        reply_tx,
    )
}

#[async_trait]
impl OutboundEndpoint for ChannelOutbound {
    async fn deliver(&self, data: Vec<u8>) -> RelayResult<Option<Vec<u8>>> {
        self.tx
            .send(data)
            .await
            .map_err(|_| RelayError::channel("外部被调方已断开"))?;
        match &self.replies {
            Some(replies) => {
                let reply = replies
                    .lock()
                    .await
                    .recv()
                    .await
                    .ok_or_else(|| RelayError::channel("外部被调方关闭了应答通道"))?;
                Ok(Some(reply))
            }
            None => Ok(None),
        }
    }
}
