use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 完整的作业消息
///
/// 携带路由元数据和业务载荷的完整请求记录，由客户端或scatter钩子创建，
/// 由终端消费者销毁。`function` 为 `"server.fn"` 形式，流水线作业使用
/// 空格连接的目标列表，`stage` 为当前所处的阶段下标。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub function: String,
    pub pipeline: String,
    pub client: String,
    pub stage: u32,
    pub payload: Vec<u8>,
    pub cache: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl JobMessage {
    pub fn new<S: Into<String>>(function: S, payload: Vec<u8>) -> Self {
        Self {
            function: function.into(),
            pipeline: String::new(),
            client: String::new(),
            stage: 0,
            payload,
            cache: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_pipeline<S: Into<String>>(mut self, pipeline: S) -> Self {
        self.pipeline = pipeline.into();
        self
    }

    pub fn with_client<S: Into<String>>(mut self, client: S) -> Self {
        self.client = client.into();
        self
    }

    pub fn with_cache_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.cache = Some(tag.into());
        self
    }

    /// 当前阶段的 `server.fn` 目标
    ///
    /// 流水线作业的 `function` 是空格连接的目标列表，按 `stage` 取对应项；
    /// 下标越界时退回第一项。
    pub fn stage_target(&self) -> &str {
        self.function
            .split_whitespace()
            .nth(self.stage as usize)
            .or_else(|| self.function.split_whitespace().next())
            .unwrap_or("")
    }

    /// 当前阶段目标的服务名（首个 `.` 之前的部分）
    pub fn target_server(&self) -> &str {
        self.stage_target().split('.').next().unwrap_or("")
    }

    /// 当前阶段目标的指令名（首个 `.` 之后的部分）
    pub fn instruction(&self) -> &str {
        self.stage_target()
            .split_once('.')
            .map(|(_, rest)| rest)
            .unwrap_or("")
    }

    /// 推进到流水线的下一阶段
    pub fn advance_stage(&mut self) {
        self.stage += 1;
    }

    pub fn serialize_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// 跨内部总线的紧凑消息
///
/// 信封模式下 `key` 指向共享缓存中完整的 [`JobMessage`] 记录，
/// 由 `to_router` 创建、`from_router` 消费销毁。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterMessage {
    pub key: String,
    pub instruction: String,
    pub payload: Vec<u8>,
    pub pipeline: String,
}

impl RouterMessage {
    pub fn new<K: Into<String>>(key: K, payload: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            instruction: String::new(),
            payload,
            pipeline: String::new(),
        }
    }

    /// 生成一个携带随机key的一次性消息
    pub fn throwaway(payload: Vec<u8>) -> Self {
        Self::new(Uuid::new_v4().to_string(), payload)
    }

    pub fn serialize_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_target_single_function() {
        let job = JobMessage::new("worker.process", b"data".to_vec());
        assert_eq!(job.stage_target(), "worker.process");
        assert_eq!(job.target_server(), "worker");
        assert_eq!(job.instruction(), "process");
    }

    #[test]
    fn test_stage_target_pipeline() {
        let mut job = JobMessage::new("extract.pull transform.clean load.push", b"".to_vec())
            .with_pipeline("etl-1");
        assert_eq!(job.stage_target(), "extract.pull");
        job.advance_stage();
        assert_eq!(job.stage_target(), "transform.clean");
        assert_eq!(job.target_server(), "transform");
        assert_eq!(job.instruction(), "clean");
        job.advance_stage();
        assert_eq!(job.stage_target(), "load.push");
    }

    #[test]
    fn test_stage_out_of_range_falls_back_to_first() {
        let mut job = JobMessage::new("a.f b.g", b"".to_vec());
        job.stage = 9;
        assert_eq!(job.stage_target(), "a.f");
    }

    #[test]
    fn test_instruction_without_dot_is_empty() {
        let job = JobMessage::new("plainname", b"".to_vec());
        assert_eq!(job.target_server(), "plainname");
        assert_eq!(job.instruction(), "");
    }

    #[test]
    fn test_job_message_roundtrip_bytes() {
        let job = JobMessage::new("worker.process", b"payload".to_vec())
            .with_pipeline("p1")
            .with_client("client-7")
            .with_cache_tag("tag");
        let bytes = job.serialize_bytes().expect("serialize");
        let back = JobMessage::deserialize_bytes(&bytes).expect("deserialize");
        assert_eq!(back, job);
    }

    #[test]
    fn test_router_message_roundtrip_bytes() {
        let mut msg = RouterMessage::new("k1", b"body".to_vec());
        msg.instruction = "process".to_string();
        msg.pipeline = "p1".to_string();
        let bytes = msg.serialize_bytes().expect("serialize");
        let back = RouterMessage::deserialize_bytes(&bytes).expect("deserialize");
        assert_eq!(back, msg);
    }

    #[test]
    fn test_throwaway_keys_are_unique() {
        let a = RouterMessage::throwaway(vec![]);
        let b = RouterMessage::throwaway(vec![]);
        assert_ne!(a.key, b.key);
    }
}
