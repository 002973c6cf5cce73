use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use relay_core::{ComponentRegistration, InboundEndpoint, RelayResult, SharedCache};

/// 旁路处理器：对每条外部消息执行用户逻辑，可直接访问共享缓存
#[async_trait]
pub trait BypassHandler: Send + Sync {
    async fn handle(&self, data: Vec<u8>, cache: &dyn SharedCache) -> RelayResult<Option<Vec<u8>>>;
}

/// 旁路组件
///
/// 只与外部端点对话（遥测、心跳、缓存直访一类），从不触碰调度器。
pub struct BypassComponent {
    registration: ComponentRegistration,
    endpoint: Arc<dyn InboundEndpoint>,
    cache: Arc<dyn SharedCache>,
    handler: Arc<dyn BypassHandler>,
}

impl BypassComponent {
    pub fn new(
        registration: ComponentRegistration,
        endpoint: Arc<dyn InboundEndpoint>,
        cache: Arc<dyn SharedCache>,
        handler: Arc<dyn BypassHandler>,
    ) -> Self {
        Self {
            registration,
            endpoint,
            cache,
            handler,
        }
    }

    pub async fn run(self) {
        let label = &self.registration.log_label;
        info!("[{}] 旁路组件启动", label);

        loop {
            let data = match self.endpoint.receive().await {
                Ok(data) => data,
                Err(e) => {
                    info!("[{}] 外部端点关闭, 旁路组件退出: {}", label, e);
                    break;
                }
            };

            match self.handler.handle(data, self.cache.as_ref()).await {
                Ok(Some(response)) => {
                    if self.endpoint.expects_reply() {
                        if let Err(e) = self.endpoint.respond(response).await {
                            error!("[{}] 旁路应答发送失败: {}", label, e);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("[{}] 旁路处理器执行失败: {}", label, e);
                }
            }
        }
    }
}
