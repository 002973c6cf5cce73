use serde::{Deserialize, Serialize};

/// 组件注册信息
///
/// 在启动阶段设置一次，此后不可变。`route` 为空表示终端注册：
/// 该组件的消息不再转发，路由器直接回以固定确认。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRegistration {
    pub name: String,
    pub route: String,
    pub blocking: bool,
    pub log_label: String,
}

impl ComponentRegistration {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        let log_label = name.clone();
        Self {
            name,
            route: String::new(),
            blocking: false,
            log_label,
        }
    }

    pub fn with_route<S: Into<String>>(mut self, route: S) -> Self {
        self.route = route.into();
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_log_label<S: Into<String>>(mut self, label: S) -> Self {
        self.log_label = label.into();
        self
    }

    /// 是否为终端注册（不转发，立即确认）
    pub fn is_terminal(&self) -> bool {
        self.route.is_empty()
    }
}
