use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use relay_core::{ComponentRegistration, Delivery, OutboundEndpoint, RelayError, ROUTE_ACK};

use crate::hooks::{identity_gather, GatherFn};
use crate::translator::EnvelopeTranslator;

/// 出站组件
///
/// 阻塞等待调度器投递，恢复完整作业消息后把散布出的各条载荷发往外部；
/// 外部被调方给出的最后一条应答作为对调度器的答复，否则回以固定确认。
/// 信封缺失或解码失败的消息被丢弃并记录日志，但调度器仍然得到确认。
pub struct OutboundComponent {
    registration: ComponentRegistration,
    deliveries: mpsc::Receiver<Delivery>,
    endpoint: Arc<dyn OutboundEndpoint>,
    translator: Arc<EnvelopeTranslator>,
    gather: GatherFn,
}

impl OutboundComponent {
    pub fn new(
        registration: ComponentRegistration,
        deliveries: mpsc::Receiver<Delivery>,
        endpoint: Arc<dyn OutboundEndpoint>,
        translator: Arc<EnvelopeTranslator>,
    ) -> Self {
        Self {
            registration,
            deliveries,
            endpoint,
            translator,
            gather: identity_gather(),
        }
    }

    /// 注入聚合策略（装配阶段调用，运行后不再变更）
    pub fn with_gather(mut self, gather: GatherFn) -> Self {
        self.gather = gather;
        self
    }

    pub async fn run(mut self) {
        let label = self.registration.log_label.clone();
        info!("[{}] 出站组件启动", label);

        while let Some(Delivery { message, reply }) = self.deliveries.recv().await {
            let job = match self.translator.from_router(&message).await {
                Ok(job) => job,
                Err(e @ RelayError::CacheMiss { .. }) => {
                    warn!("[{}] 信封记录缺失, 丢弃消息: {}", label, e);
                    let _ = reply.send(ROUTE_ACK.to_vec());
                    continue;
                }
                Err(e) => {
                    error!("[{}] 消息恢复失败, 丢弃消息: {}", label, e);
                    let _ = reply.send(ROUTE_ACK.to_vec());
                    continue;
                }
            };

            let jobs = match (self.gather)(job) {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!("[{}] 聚合钩子执行失败, 以空序列降级: {}", label, e);
                    Vec::new()
                }
            };

            let mut last_reply: Option<Vec<u8>> = None;
            for out in jobs {
                debug!("[{}] 外部投递 {} 字节", label, out.payload.len());
                match self.endpoint.deliver(out.payload).await {
                    Ok(Some(response)) => last_reply = Some(response),
                    Ok(None) => {}
                    Err(e) => {
                        error!("[{}] 外部投递失败: {}", label, e);
                    }
                }
            }

            let _ = reply.send(last_reply.unwrap_or_else(|| ROUTE_ACK.to_vec()));
        }

        info!("[{}] 投递通道关闭, 出站组件退出", label);
    }
}
