use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use relay_core::{RelayResult, SharedCache};

/// 内存共享缓存实现
///
/// 单把读写锁串行化各个操作，适用于单进程内的组件集群和测试场景。
/// 不提供跨键事务，信封一跳也不需要。
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前缓存条目数（测试中用于观察泄漏的信封条目）
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn get(&self, key: &str) -> RelayResult<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> RelayResult<String> {
        debug!("写入缓存条目: {} ({} 字节)", key, value.len());
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(key.to_string())
    }

    async fn delete(&self, key: &str) -> RelayResult<()> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_none() {
            debug!("删除不存在的缓存条目: {}", key);
        }
        Ok(())
    }
}
