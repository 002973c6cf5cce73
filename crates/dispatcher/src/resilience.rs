use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use relay_core::{DispatcherHandle, RelayError, RelayResult, ResilienceConfig, RouterMessage, Verdict};

/// 控制消息的方向标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// 派发通知：一条消息刚发往工作方
    To,
    /// 完成通知：工作方对一条消息给出了结果
    From,
}

/// 容错服务控制通道上的一条通知
#[derive(Debug)]
pub struct Notice {
    pub kind: NoticeKind,
    /// 派发通知的重发目的地（完成通知不使用）
    pub target: String,
    pub message: RouterMessage,
    pub reply: oneshot::Sender<Verdict>,
}

/// 发往容错服务的可克隆句柄
#[derive(Debug, Clone)]
pub struct ResilienceHandle {
    tx: mpsc::Sender<Notice>,
}

impl ResilienceHandle {
    /// 报告一次派发，应答为单纯确认
    pub async fn dispatched(&self, target: &str, message: RouterMessage) -> RelayResult<Verdict> {
        self.notify(NoticeKind::To, target, message).await
    }

    /// 报告一次完成，应答裁决是否应当处理该结果
    pub async fn completed(&self, message: RouterMessage) -> RelayResult<Verdict> {
        self.notify(NoticeKind::From, "", message).await
    }

    async fn notify(
        &self,
        kind: NoticeKind,
        target: &str,
        message: RouterMessage,
    ) -> RelayResult<Verdict> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Notice {
                kind,
                target: target.to_string(),
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RelayError::channel("容错服务控制通道已关闭"))?;
        reply_rx
            .await
            .map_err(|_| RelayError::channel("容错服务丢弃了应答"))
    }
}

/// 三张表共用一把锁：任何同时触碰多张表的转移都是原子的
struct ResilienceState {
    /// 在途消息：key -> (重发目的地, 载荷)
    waiting: HashMap<String, (String, RouterMessage)>,
    /// 已重发消息的未决重发次数
    resent: HashMap<String, u32>,
    /// 预期将到来的重复完成标记
    omit: HashSet<String>,
    /// 本周期内派发的消息数
    messages_sent: u64,
    /// 当前重发周期
    flush_interval: Duration,
}

impl ResilienceState {
    fn new(flush_interval: Duration) -> Self {
        Self {
            waiting: HashMap::new(),
            resent: HashMap::new(),
            omit: HashSet::new(),
            messages_sent: 0,
            flush_interval,
        }
    }

    /// 稳态下一个key至多出现在 {waiting} 或 {resent ∪ omit} 之一
    fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.resent.is_empty() && self.omit.is_empty()
    }

    fn apply(&mut self, kind: NoticeKind, target: &str, message: &RouterMessage) -> Verdict {
        match kind {
            NoticeKind::To => {
                self.waiting.insert(
                    message.key.clone(),
                    (target.to_string(), message.clone()),
                );
                self.messages_sent += 1;
                Verdict::Ack
            }
            NoticeKind::From => {
                let key = &message.key;
                self.waiting.remove(key);

                if let Some(count) = self.resent.get_mut(key) {
                    // 该消息至少重发过一次：预期重发还会带来一次重复完成
                    *count -= 1;
                    if *count == 0 {
                        self.resent.remove(key);
                    }
                    self.omit.insert(key.clone());
                    return Verdict::Process;
                }

                if self.omit.contains(key) {
                    // 这正是先前预期的重复完成
                    if !self.resent.contains_key(key) {
                        self.omit.remove(key);
                    }
                    return Verdict::Skip;
                }

                // 首次正常完成
                Verdict::Process
            }
        }
    }
}

/// 容错服务
///
/// 以定时重发加重复抑制掩盖派发与完成两条腿上的消息丢失，
/// 重发周期由比例控制器按实测冗余比自适应调整。永不完成的消息
/// 会无限重发——没有重试上限和死信出口，这是留待生产加固的缺口。
pub struct ResilienceService {
    notices: mpsc::Receiver<Notice>,
    state: Arc<Mutex<ResilienceState>>,
    dispatch: DispatcherHandle,
    config: ResilienceConfig,
}

impl ResilienceService {
    /// 构造服务及其控制句柄；`dispatch` 是重发所走的调度通道
    pub fn new(dispatch: DispatcherHandle, config: ResilienceConfig) -> (ResilienceHandle, Self) {
        let (tx, rx) = mpsc::channel(config.control_channel_capacity);
        let state = Arc::new(Mutex::new(ResilienceState::new(config.flush_interval)));
        (
            ResilienceHandle { tx },
            Self {
                notices: rx,
                state,
                dispatch,
                config,
            },
        )
    }

    pub async fn run(mut self) {
        info!(
            "容错服务启动, 基础重发周期 {:?}, 目标冗余比 {}",
            self.config.flush_interval, self.config.target_redundancy
        );

        let flusher = tokio::spawn(flush_loop(
            self.state.clone(),
            self.dispatch.clone(),
            self.config.clone(),
        ));

        while let Some(notice) = self.notices.recv().await {
            let verdict = {
                let mut state = self.state.lock().await;
                state.apply(notice.kind, &notice.target, &notice.message)
            };
            let _ = notice.reply.send(verdict);
        }

        flusher.abort();
        info!("控制通道关闭, 容错服务停止");
    }
}

async fn flush_loop(
    state: Arc<Mutex<ResilienceState>>,
    dispatch: DispatcherHandle,
    config: ResilienceConfig,
) {
    loop {
        let interval = { state.lock().await.flush_interval };
        tokio::time::sleep(interval).await;
        let next = flush_cycle(&state, &dispatch, &config).await;
        state.lock().await.flush_interval = next;
    }
}

/// 执行一轮重发并返回比例控制器给出的下一周期
///
/// 快照在途表，为每个条目登记一次重发并在调度通道上重新派发（逐条
/// 等待确认）；随后用 快照大小 / 本周期派发数 估计实际冗余比，按
/// 与目标冗余比的比值缩放周期。
async fn flush_cycle(
    state: &Arc<Mutex<ResilienceState>>,
    dispatch: &DispatcherHandle,
    config: &ResilienceConfig,
) -> Duration {
    let (snapshot, messages_sent, current) = {
        let mut state = state.lock().await;
        let snapshot: Vec<(String, String, RouterMessage)> = state
            .waiting
            .iter()
            .map(|(key, (target, message))| (key.clone(), target.clone(), message.clone()))
            .collect();
        for (key, _, _) in &snapshot {
            *state.resent.entry(key.clone()).or_insert(0) += 1;
        }
        let sent = state.messages_sent.max(1);
        state.messages_sent = 1;
        (snapshot, sent, state.flush_interval)
    };

    if !snapshot.is_empty() {
        warn!("重发 {} 条未完成消息", snapshot.len());
    }
    for (key, target, message) in &snapshot {
        match dispatch.request(target, message.clone()).await {
            Ok(_) => debug!("重发 {} -> {} 已确认", key, target),
            Err(e) => error!("重发 {} -> {} 失败: {}", key, target, e),
        }
    }

    let actual_redundancy = snapshot.len() as f64 / messages_sent as f64;
    let next = current.mul_f64(actual_redundancy / config.target_redundancy);
    let next = config.clamp_interval(next);
    debug!(
        "冗余比 {:.4}, 下一重发周期 {:?}",
        actual_redundancy, next
    );
    next
}
