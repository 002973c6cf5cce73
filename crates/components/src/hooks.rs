use std::sync::Arc;

use relay_core::{JobMessage, RelayResult};

/// 入站散布钩子：把一条外部消息展开为 0..N 条作业消息
pub type ScatterFn = Arc<dyn Fn(&[u8]) -> RelayResult<Vec<JobMessage>> + Send + Sync>;

/// 出站聚合钩子：改写或复制一条待投递的作业消息
pub type GatherFn = Arc<dyn Fn(JobMessage) -> RelayResult<Vec<JobMessage>> + Send + Sync>;

/// 反馈累积钩子：把一轮内部往返的多个应答折叠为一个
pub type FeedbackFn = Arc<dyn Fn(Option<Vec<u8>>, Vec<u8>) -> Vec<u8> + Send + Sync>;

/// 默认散布：原样包装为一条指向给定目标的作业消息
pub fn identity_scatter<S: Into<String>>(function: S) -> ScatterFn {
    let function = function.into();
    Arc::new(move |data: &[u8]| Ok(vec![JobMessage::new(function.clone(), data.to_vec())]))
}

/// 默认聚合：消息原样通过
pub fn identity_gather() -> GatherFn {
    Arc::new(|job| Ok(vec![job]))
}

/// 默认反馈累积：保留最新应答
pub fn keep_latest_feedback() -> FeedbackFn {
    Arc::new(|_previous, latest| latest)
}
