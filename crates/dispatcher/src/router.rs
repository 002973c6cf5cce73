use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use relay_core::{
    Delivery, DispatchRequest, DispatcherHandle, RelayError, RelayResult, RouterMessage, Verdict,
    ROUTE_ACK, ROUTE_FAIL,
};

use crate::resilience::ResilienceHandle;

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const DELIVERY_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
struct InboundEntry {
    route: String,
    blocking: bool,
    log_label: String,
}

struct OutboundEntry {
    tx: mpsc::Sender<Delivery>,
    reroute: Option<String>,
    log_label: String,
}

/// 同步路由器的装配器
///
/// 两张静态表在启动阶段登记完毕，此后不可变。每个入站组件拿到一个
/// 调度句柄，每个出站组件拿到一条专属投递通道。
pub struct RouterBuilder {
    request_tx: mpsc::Sender<DispatchRequest>,
    request_rx: mpsc::Receiver<DispatchRequest>,
    inbound: HashMap<String, InboundEntry>,
    outbound: HashMap<String, OutboundEntry>,
    resilience: Option<ResilienceHandle>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        Self {
            request_tx,
            request_rx,
            inbound: HashMap::new(),
            outbound: HashMap::new(),
            resilience: None,
        }
    }

    /// 登记入站组件：`route` 为空表示终端注册
    pub fn register_inbound(
        &mut self,
        name: &str,
        route: &str,
        blocking: bool,
        log_label: &str,
    ) -> RelayResult<DispatcherHandle> {
        if self.inbound.contains_key(name) {
            return Err(RelayError::config_error(format!(
                "入站组件 {name} 重复注册"
            )));
        }
        self.inbound.insert(
            name.to_string(),
            InboundEntry {
                route: route.to_string(),
                blocking,
                log_label: log_label.to_string(),
            },
        );
        Ok(DispatcherHandle::new(name, self.request_tx.clone()))
    }

    /// 登记出站组件，返回其专属投递通道的接收端
    pub fn register_outbound(
        &mut self,
        name: &str,
        reroute: Option<&str>,
        log_label: &str,
    ) -> RelayResult<mpsc::Receiver<Delivery>> {
        if self.outbound.contains_key(name) {
            return Err(RelayError::config_error(format!(
                "出站组件 {name} 重复注册"
            )));
        }
        let (tx, rx) = mpsc::channel(DELIVERY_CHANNEL_CAPACITY);
        self.outbound.insert(
            name.to_string(),
            OutboundEntry {
                tx,
                reroute: reroute.map(str::to_string),
                log_label: log_label.to_string(),
            },
        );
        Ok(rx)
    }

    /// 在派发与完成两侧挂接容错服务的观察通知
    ///
    /// 只有首跳（入站注册的静态路由）产生派发通知，reroute跳不参与观察。
    /// 被判定为重复的完成不走reroute跳，发送方收到固定确认而不是真实应答。
    pub fn with_resilience(mut self, handle: ResilienceHandle) -> Self {
        self.resilience = Some(handle);
        self
    }

    pub fn build(self) -> RelayResult<Router> {
        if self.inbound.is_empty() {
            return Err(RelayError::config_error("路由器没有任何入站注册"));
        }
        Ok(Router {
            requests: self.request_rx,
            inbound: self.inbound,
            outbound: self.outbound,
            resilience: self.resilience,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 同步单跳路由器
///
/// 单个事件循环串行处理请求，同一时刻至多一条消息在途。对每条请求：
/// 终端注册立即确认；否则原样转发到静态路由的目的地并阻塞等待其应答，
/// 声明了reroute的目的地会让应答再走一跳（该跳应答内容被丢弃）；最终
/// 按注册的blocking标志回给原始发送方真实应答或固定确认。任何失败
/// 分支也必须给发送方一个显式失败标记，不允许让它无限等待。
pub struct Router {
    requests: mpsc::Receiver<DispatchRequest>,
    inbound: HashMap<String, InboundEntry>,
    outbound: HashMap<String, OutboundEntry>,
    resilience: Option<ResilienceHandle>,
}

impl Router {
    pub async fn run(mut self) {
        info!(
            "同步路由器启动, 入站 {} 个, 出站 {} 个",
            self.inbound.len(),
            self.outbound.len()
        );

        while let Some(request) = self.requests.recv().await {
            self.process(request).await;
        }

        info!("请求通道关闭, 同步路由器停止");
    }

    async fn process(&self, request: DispatchRequest) {
        let DispatchRequest {
            from,
            target: _,
            message,
            reply,
        } = request;

        let entry = match self.inbound.get(&from) {
            Some(entry) => entry,
            None => {
                warn!("未注册的发送方 {}, 丢弃消息并回以失败标记", from);
                let _ = reply.send(ROUTE_FAIL.to_vec());
                return;
            }
        };

        // 终端注册：不转发，立即确认
        if entry.route.is_empty() {
            debug!("[{}] 终端注册, 立即确认", entry.log_label);
            let _ = reply.send(ROUTE_ACK.to_vec());
            return;
        }

        let destination = match self.outbound.get(&entry.route) {
            Some(destination) => destination,
            None => {
                warn!(
                    "[{}] 目的地 {} 未注册, 丢弃消息并回以失败标记",
                    entry.log_label, entry.route
                );
                let _ = reply.send(ROUTE_FAIL.to_vec());
                return;
            }
        };

        // 只有首跳登记派发通知，reroute跳不参与容错观察
        if let Some(resilience) = &self.resilience {
            if let Err(e) = resilience.dispatched(&entry.route, message.clone()).await {
                warn!("[{}] 派发通知发送失败: {}", entry.log_label, e);
            }
        }

        let outbound_reply = match self
            .forward(destination, &entry.route, message.clone())
            .await
        {
            Ok(outbound_reply) => outbound_reply,
            Err(e) => {
                warn!(
                    "[{}] 转发到 {} 失败: {}, 回以失败标记",
                    entry.log_label, entry.route, e
                );
                let _ = reply.send(ROUTE_FAIL.to_vec());
                return;
            }
        };

        let mut duplicate = false;
        if let Some(resilience) = &self.resilience {
            match resilience.completed(message.clone()).await {
                Ok(Verdict::Skip) => {
                    debug!(
                        "[{}] 完成通知被判定为重复, 抑制该应答: {}",
                        entry.log_label, message.key
                    );
                    duplicate = true;
                }
                Ok(_) => {}
                Err(e) => warn!("[{}] 完成通知发送失败: {}", entry.log_label, e),
            }
        }

        // 声明了reroute的目的地：应答再走一跳，该跳的应答内容被丢弃。
        // 重复完成的应答不再扩散。
        if !duplicate {
            if let Some(reroute) = &destination.reroute {
                match self.outbound.get(reroute) {
                    Some(hop) => {
                        let forwarded = RouterMessage {
                            key: message.key.clone(),
                            instruction: message.instruction.clone(),
                            payload: outbound_reply.clone(),
                            pipeline: message.pipeline.clone(),
                        };
                        if let Err(e) = self.forward(hop, reroute, forwarded).await {
                            warn!(
                                "[{}] reroute到 {} 失败: {}",
                                destination.log_label, reroute, e
                            );
                        }
                    }
                    None => {
                        warn!(
                            "[{}] reroute目的地 {} 未注册, 跳过该跳",
                            destination.log_label, reroute
                        );
                    }
                }
            }
        }

        let final_reply = if entry.blocking && !duplicate {
            outbound_reply
        } else {
            ROUTE_ACK.to_vec()
        };
        let _ = reply.send(final_reply);
    }

    /// 向目的地投递一条消息并阻塞等待其应答
    async fn forward(
        &self,
        destination: &OutboundEntry,
        route: &str,
        message: RouterMessage,
    ) -> RelayResult<Vec<u8>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        destination
            .tx
            .send(Delivery {
                message,
                reply: ack_tx,
            })
            .await
            .map_err(|_| RelayError::routing(format!("目的地 {route} 的投递通道已关闭")))?;

        ack_rx
            .await
            .map_err(|_| RelayError::routing(format!("目的地 {route} 丢弃了应答")))
    }
}
