use async_trait::async_trait;

use crate::errors::RelayResult;

/// 共享缓存抽象接口
///
/// 信封模式的内部一跳依赖它暂存完整的作业消息。缺失的键以 `Ok(None)`
/// 表示而不是错误；单个操作内部自行加锁，不提供跨键事务。
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// 读取键对应的值，缺失时返回 `None`
    async fn get(&self, key: &str) -> RelayResult<Option<Vec<u8>>>;

    /// 写入键值，返回实际使用的键
    async fn set(&self, key: &str, value: Vec<u8>) -> RelayResult<String>;

    /// 删除键
    async fn delete(&self, key: &str) -> RelayResult<()>;
}
