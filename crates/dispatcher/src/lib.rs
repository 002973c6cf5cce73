//! 调度层：同步路由器、异步缓冲代理与容错服务
//!
//! 三个调度器共享同一套总线原语（`DispatchRequest` / `Delivery`），
//! 组件侧代码对具体挂载的调度器保持无感。

pub mod broker;
pub mod resilience;
pub mod router;

pub use broker::{Broker, BrokerBuilder, HandlerFn};
pub use resilience::{Notice, NoticeKind, ResilienceHandle, ResilienceService};
pub use router::{Router, RouterBuilder};
