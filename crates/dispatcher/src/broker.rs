use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use relay_core::{
    BrokerConfig, Delivery, DispatchRequest, DispatcherHandle, RelayError, RelayResult,
    RouterMessage, ROUTE_ACK, ROUTE_FAIL,
};

/// 内联函数处理器：按解码出的指令名对载荷做一次变换
pub type HandlerFn = Arc<dyn Fn(&[u8]) -> RelayResult<Vec<u8>> + Send + Sync>;

#[derive(Debug, Clone)]
struct InboundEntry {
    route: String,
    log_label: String,
}

/// 异步缓冲代理的装配器
pub struct BrokerBuilder {
    config: BrokerConfig,
    request_tx: mpsc::Sender<DispatchRequest>,
    request_rx: mpsc::Receiver<DispatchRequest>,
    inbound: HashMap<String, InboundEntry>,
    destinations: HashMap<String, mpsc::Sender<Delivery>>,
    handlers: HashMap<String, HandlerFn>,
}

impl BrokerBuilder {
    pub fn new(config: BrokerConfig) -> Self {
        let (request_tx, request_rx) = mpsc::channel(config.request_channel_capacity);
        Self {
            config,
            request_tx,
            request_rx,
            inbound: HashMap::new(),
            destinations: HashMap::new(),
            handlers: HashMap::new(),
        }
    }

    /// 登记入站组件：`route` 为请求未指明目标时的缺省目的地
    pub fn register_inbound(
        &mut self,
        name: &str,
        route: &str,
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
                log_label: log_label.to_string(),
            },
        );
        Ok(DispatcherHandle::new(name, self.request_tx.clone()))
    }

    /// 登记出站目的地，返回其专属投递通道的接收端；初始即为就绪状态
    pub fn register_outbound(
        &mut self,
        name: &str,
        _log_label: &str,
    ) -> RelayResult<mpsc::Receiver<Delivery>> {
        if self.destinations.contains_key(name) {
            return Err(RelayError::config_error(format!(
                "出站目的地 {name} 重复注册"
            )));
        }
        let (tx, rx) = mpsc::channel(self.config.delivery_channel_capacity);
        self.destinations.insert(name.to_string(), tx);
        Ok(rx)
    }

    /// 登记一个指令处理器（启动阶段填充的显式类型化注册表）
    pub fn register_handler(&mut self, instruction: &str, handler: HandlerFn) -> RelayResult<()> {
        if self.handlers.contains_key(instruction) {
            return Err(RelayError::config_error(format!(
                "指令 {instruction} 的处理器重复注册"
            )));
        }
        self.handlers.insert(instruction.to_string(), handler);
        Ok(())
    }

    pub fn build(self) -> RelayResult<Broker> {
        if self.inbound.is_empty() {
            return Err(RelayError::config_error("缓冲代理没有任何入站注册"));
        }
        let available = self.destinations.keys().cloned().collect();
        let max_buffer = self.config.effective_buffer_size();
        let resume_threshold = self.config.resume_threshold();
        Ok(Broker {
            requests: self.request_rx,
            state: BrokerState {
                inbound: self.inbound,
                destinations: self.destinations,
                handlers: self.handlers,
                buffers: HashMap::new(),
                available,
                buffered: 0,
                buffering: false,
                max_buffer,
                resume_threshold,
            },
        })
    }
}

/// 一次在途投递的完成：目的地名与它的应答
type AckFuture = BoxFuture<'static, (String, Result<Vec<u8>, ()>)>;

struct BrokerState {
    inbound: HashMap<String, InboundEntry>,
    destinations: HashMap<String, mpsc::Sender<Delivery>>,
    handlers: HashMap<String, HandlerFn>,
    /// 每个目的地一条FIFO缓冲队列
    buffers: HashMap<String, VecDeque<RouterMessage>>,
    /// 空闲且可直接投递的目的地集合
    available: HashSet<String>,
    /// 所有目的地合计的缓冲消息数
    buffered: usize,
    /// 入站轮询是否已暂停
    buffering: bool,
    max_buffer: usize,
    resume_threshold: usize,
}

/// 异步缓冲代理
///
/// 在同步路由器之上增加内联函数派发和按目的地的有界背压缓冲。
/// 发送方总是立即得到确认，不会被缓冲阻塞；缓冲总量到达上限后暂停
/// 轮询入站请求，回落到上限的10%以下时恢复。单个目的地的投递顺序
/// 保持FIFO。
///
/// 指令处理器只改写命中注册表的消息。未注册的指令仅在自指请求上
/// 降级为空载荷应答；发往真实目的地的消息原样穿过，指令由目的地
/// 自行解释。
pub struct Broker {
    requests: mpsc::Receiver<DispatchRequest>,
    state: BrokerState,
}

impl Broker {
    pub async fn run(mut self) {
        info!(
            "缓冲代理启动, 目的地 {} 个, 缓冲上限 {}",
            self.state.destinations.len(),
            self.state.max_buffer
        );
        let mut inflight: FuturesUnordered<AckFuture> = FuturesUnordered::new();

        loop {
            tokio::select! {
                Some((name, ack)) = inflight.next(), if !inflight.is_empty() => {
                    self.state.on_destination_ready(name, ack, &mut inflight);
                }
                maybe_request = self.requests.recv(), if !self.state.buffering => {
                    match maybe_request {
                        Some(request) => self.state.on_request(request, &mut inflight),
                        None => break,
                    }
                }
                else => break,
            }
        }

        info!("请求通道关闭, 缓冲代理停止");
    }
}

impl BrokerState {
    /// 目的地宣告就绪：有积压则弹出一条投递，否则标记为空闲
    fn on_destination_ready(
        &mut self,
        name: String,
        ack: Result<Vec<u8>, ()>,
        inflight: &mut FuturesUnordered<AckFuture>,
    ) {
        if ack.is_err() {
            let dropped = self
                .buffers
                .remove(&name)
                .map(|queue| queue.len())
                .unwrap_or(0);
            self.buffered -= dropped;
            self.destinations.remove(&name);
            self.available.remove(&name);
            warn!("目的地 {} 的通道已关闭, 丢弃其缓冲的 {} 条消息", name, dropped);
            self.maybe_resume();
            return;
        }

        let next = self
            .buffers
            .get_mut(&name)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(message) => {
                self.buffered -= 1;
                debug!("目的地 {} 就绪, 弹出缓冲消息 {}", name, message.key);
                self.deliver(&name, message, inflight);
                self.maybe_resume();
            }
            None => {
                self.available.insert(name);
            }
        }
    }

    fn on_request(&mut self, request: DispatchRequest, inflight: &mut FuturesUnordered<AckFuture>) {
        let DispatchRequest {
            from,
            target,
            mut message,
            reply,
        } = request;

        let entry = match self.inbound.get(&from) {
            Some(entry) => entry.clone(),
            None => {
                warn!("未注册的发送方 {}, 回以失败标记", from);
                let _ = reply.send(ROUTE_FAIL.to_vec());
                return;
            }
        };

        // 内联函数派发：指令命中注册表时变换载荷
        let mut handled = false;
        if !message.instruction.is_empty() {
            if let Some(handler) = self.handlers.get(&message.instruction) {
                match handler(&message.payload) {
                    Ok(output) => message.payload = output,
                    Err(e) => {
                        warn!(
                            "[{}] 指令 {} 的处理器执行失败, 以空载荷降级: {}",
                            entry.log_label, message.instruction, e
                        );
                        message.payload = Vec::new();
                    }
                }
                handled = true;
            }
        }

        let target = if target.is_empty() {
            entry.route.clone()
        } else {
            target
        };

        // 目标是发送方自身：内联应答，不经过任何目的地
        if target == from {
            if !handled {
                warn!(
                    "[{}] 未注册的指令 {}, 回以空载荷",
                    entry.log_label, message.instruction
                );
                message.payload = Vec::new();
            }
            let _ = reply.send(message.payload);
            return;
        }

        if !self.destinations.contains_key(&target) {
            warn!("[{}] 目的地 {} 未注册, 回以失败标记", entry.log_label, target);
            let _ = reply.send(ROUTE_FAIL.to_vec());
            return;
        }

        // 发送方从不被缓冲阻塞，一律立即确认
        let _ = reply.send(ROUTE_ACK.to_vec());

        if self.available.remove(&target) {
            debug!("[{}] 目的地 {} 空闲, 直接投递", entry.log_label, target);
            self.deliver(&target, message, inflight);
        } else {
            self.buffers
                .entry(target.clone())
                .or_default()
                .push_back(message);
            self.buffered += 1;
            if self.buffered >= self.max_buffer && !self.buffering {
                self.buffering = true;
                info!(
                    "缓冲总量达到上限 {}, 暂停入站轮询",
                    self.max_buffer
                );
            }
        }
    }

    /// 向目的地发出一次在途投递，应答完成即视为该目的地再次就绪
    fn deliver(
        &mut self,
        name: &str,
        message: RouterMessage,
        inflight: &mut FuturesUnordered<AckFuture>,
    ) {
        let Some(tx) = self.destinations.get(name).cloned() else {
            warn!("目的地 {} 不存在, 消息 {} 被丢弃", name, message.key);
            return;
        };
        let name = name.to_string();
        inflight.push(Box::pin(async move {
            let (ack_tx, ack_rx) = oneshot::channel();
            if tx
                .send(Delivery {
                    message,
                    reply: ack_tx,
                })
                .await
                .is_err()
            {
                return (name, Err(()));
            }
            let ack = ack_rx.await.map_err(|_| ());
            (name, ack)
        }));
    }

    fn maybe_resume(&mut self) {
        if self.buffering && self.buffered < self.resume_threshold {
            self.buffering = false;
            info!(
                "缓冲总量回落到 {} (阈值 {}), 恢复入站轮询",
                self.buffered, self.resume_threshold
            );
        }
    }
}
