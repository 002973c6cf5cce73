use std::sync::Arc;

use tracing::{debug, error, info};

use relay_core::{ComponentRegistration, DispatcherHandle, InboundEndpoint};

use crate::hooks::{identity_scatter, keep_latest_feedback, FeedbackFn, ScatterFn};
use crate::translator::EnvelopeTranslator;

/// 入站组件
///
/// 交替执行一次外部操作和一次内部往返：收到外部消息后经散布钩子展开，
/// 逐条翻译上总线并阻塞等待调度器应答，经反馈钩子折叠后按需回话。
/// 单条坏消息只产生日志和降级结果，处理循环不会因此终止。
pub struct InboundComponent {
    registration: ComponentRegistration,
    endpoint: Arc<dyn InboundEndpoint>,
    translator: Arc<EnvelopeTranslator>,
    dispatcher: DispatcherHandle,
    scatter: ScatterFn,
    feedback: FeedbackFn,
}

impl InboundComponent {
    pub fn new(
        registration: ComponentRegistration,
        endpoint: Arc<dyn InboundEndpoint>,
        translator: Arc<EnvelopeTranslator>,
        dispatcher: DispatcherHandle,
    ) -> Self {
        let scatter = identity_scatter(registration.route.clone());
        Self {
            registration,
            endpoint,
            translator,
            dispatcher,
            scatter,
            feedback: keep_latest_feedback(),
        }
    }

    /// 注入散布策略（装配阶段调用，运行后不再变更）
    pub fn with_scatter(mut self, scatter: ScatterFn) -> Self {
        self.scatter = scatter;
        self
    }

    /// 注入反馈累积策略
    pub fn with_feedback(mut self, feedback: FeedbackFn) -> Self {
        self.feedback = feedback;
        self
    }

    pub async fn run(self) {
        let label = &self.registration.log_label;
        info!("[{}] 入站组件启动, route: {}", label, self.registration.route);

        loop {
            let data = match self.endpoint.receive().await {
                Ok(data) => data,
                Err(e) => {
                    info!("[{}] 外部端点关闭, 入站组件退出: {}", label, e);
                    break;
                }
            };

            let jobs = match (self.scatter)(&data) {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!("[{}] 散布钩子执行失败, 以空序列降级: {}", label, e);
                    Vec::new()
                }
            };

            let mut feedback: Option<Vec<u8>> = None;
            for job in jobs {
                let target = {
                    let server = job.target_server();
                    if server.is_empty() {
                        self.registration.route.clone()
                    } else {
                        server.to_string()
                    }
                };

                let (message, key) = match self.translator.to_router(&job).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("[{}] 作业消息翻译失败: {}", label, e);
                        continue;
                    }
                };

                debug!("[{}] 派发 key: {} -> {}", label, key, target);
                match self.dispatcher.request(&target, message).await {
                    Ok(reply) => {
                        feedback = Some((self.feedback)(feedback.take(), reply));
                    }
                    Err(e) => {
                        error!("[{}] 调度请求失败, key: {}: {}", label, key, e);
                    }
                }
            }

            if self.endpoint.expects_reply() {
                let reply = feedback.unwrap_or_default();
                if let Err(e) = self.endpoint.respond(reply).await {
                    error!("[{}] 外部应答发送失败: {}", label, e);
                }
            }
        }
    }
}
