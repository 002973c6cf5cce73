use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use relay_core::{
    JobMessage, RelayError, RelayResult, RouterMessage, SharedCache, TranslatorConfig,
};

/// 信封翻译器
///
/// 在完整的作业消息与跨内部总线的紧凑消息之间转换。信封模式下完整记录
/// 暂存于共享缓存，键的创建方拥有该条目，直到恰好一次消费性读取发生；
/// 完成通知永久丢失会留下泄漏的条目，这是已知限制，不在此处掩盖。
pub struct EnvelopeTranslator {
    cache: Arc<dyn SharedCache>,
    envelope: bool,
}

impl EnvelopeTranslator {
    pub fn new(cache: Arc<dyn SharedCache>, config: TranslatorConfig) -> Self {
        Self {
            cache,
            envelope: config.envelope,
        }
    }

    pub fn envelope_enabled(&self) -> bool {
        self.envelope
    }

    /// 作业消息 -> 紧凑消息
    ///
    /// 信封模式下把完整序列化记录存入共享缓存并返回所用的键；
    /// 键冲突时追加随机后缀并记录日志。非信封模式发放一次性键，
    /// 指令与流水线字段留空，载荷原样穿过。
    pub async fn to_router(&self, job: &JobMessage) -> RelayResult<(RouterMessage, String)> {
        if !self.envelope {
            let message = RouterMessage::throwaway(job.payload.clone());
            let key = message.key.clone();
            return Ok((message, key));
        }

        let instruction = job.instruction().to_string();
        let mut key = match &job.cache {
            Some(tag) if !job.pipeline.is_empty() => format!("{}-{}", job.pipeline, tag),
            Some(tag) => tag.clone(),
            None => Uuid::new_v4().to_string(),
        };

        if self.cache.get(&key).await?.is_some() {
            let suffixed = format!("{}-{:08x}", key, rand::random::<u32>());
            warn!("缓存键 {} 已被占用，改用 {}", key, suffixed);
            key = suffixed;
        }

        let record = job.serialize_bytes().map_err(RelayError::from)?;
        let key = self.cache.set(&key, record).await?;
        debug!("作业消息已暂存, key: {}, instruction: {}", key, instruction);

        let message = RouterMessage {
            key: key.clone(),
            instruction,
            payload: job.payload.clone(),
            pipeline: job.pipeline.clone(),
        };
        Ok((message, key))
    }

    /// 紧凑消息 -> 作业消息
    ///
    /// 信封模式下取出并删除缓存记录（恰好一次消费），再用紧凑消息的
    /// 载荷覆盖记录中的载荷；缺失的记录以 [`RelayError::CacheMiss`] 上抛，
    /// 由调用方记录日志并降级。
    pub async fn from_router(&self, message: &RouterMessage) -> RelayResult<JobMessage> {
        if !self.envelope {
            return Ok(JobMessage::new("", message.payload.clone()));
        }

        let record = self
            .cache
            .get(&message.key)
            .await?
            .ok_or_else(|| RelayError::cache_miss(&message.key))?;
        self.cache.delete(&message.key).await?;

        let mut job = JobMessage::deserialize_bytes(&record).map_err(RelayError::from)?;
        job.payload = message.payload.clone();
        Ok(job)
    }
}
