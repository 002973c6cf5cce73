use tokio::sync::{mpsc, oneshot};

use crate::errors::{RelayError, RelayResult};
use crate::models::RouterMessage;

/// 固定的1字节确认应答
pub const ROUTE_ACK: &[u8] = &[0x06];
/// 显式失败标记：路由器对无法投递的请求也必须给出应答
pub const ROUTE_FAIL: &[u8] = &[0x15];

/// 容错服务的应答裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 首次完成，调用方应当处理
    Process,
    /// 重发产生的重复完成，调用方应当丢弃
    Skip,
    /// 对派发通知的单纯确认
    Ack,
}

impl Verdict {
    pub fn as_token(&self) -> &'static [u8] {
        match self {
            Verdict::Process => b"process",
            Verdict::Skip => b"skip",
            Verdict::Ack => b"ack",
        }
    }

    pub fn from_token(token: &[u8]) -> RelayResult<Self> {
        match token {
            b"process" => Ok(Verdict::Process),
            b"skip" => Ok(Verdict::Skip),
            b"ack" => Ok(Verdict::Ack),
            other => Err(RelayError::decode(format!(
                "未知的裁决令牌: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// 入站组件发往调度器的一次请求
///
/// 每个组件与调度器之间严格保持请求/应答节奏：组件在 `reply` 被
/// 应答之前不会发出下一条请求。
#[derive(Debug)]
pub struct DispatchRequest {
    /// 发送方组件名
    pub from: String,
    /// 目标组件名（同步路由器使用静态表，忽略此字段）
    pub target: String,
    pub message: RouterMessage,
    pub reply: oneshot::Sender<Vec<u8>>,
}

/// 调度器发往出站组件专属通道的一次投递
#[derive(Debug)]
pub struct Delivery {
    pub message: RouterMessage,
    pub reply: oneshot::Sender<Vec<u8>>,
}

/// 组件持有的调度器句柄
///
/// 包装共享的请求通道并记住组件自身的名字，`request` 在收到应答前阻塞，
/// 从而保证每个组件同一时刻至多一个在途调用。
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    name: String,
    tx: mpsc::Sender<DispatchRequest>,
}

impl DispatcherHandle {
    pub fn new<S: Into<String>>(name: S, tx: mpsc::Sender<DispatchRequest>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 发出一条消息并阻塞等待调度器应答
    pub async fn request(&self, target: &str, message: RouterMessage) -> RelayResult<Vec<u8>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(DispatchRequest {
                from: self.name.clone(),
                target: target.to_string(),
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RelayError::channel("调度器请求通道已关闭"))?;
        reply_rx
            .await
            .map_err(|_| RelayError::channel("调度器丢弃了应答通道"))
    }
}
