//! # 组件角色
//!
//! 桥接外部传输与内部总线的三类组件（入站、出站、旁路）以及
//! 负责跨越内部一跳的信封翻译器。散布/聚合/反馈策略在构造时注入，
//! 装配完成后不再变更。

pub mod bypass;
pub mod hooks;
pub mod inbound;
pub mod outbound;
pub mod translator;

pub use bypass::{BypassComponent, BypassHandler};
pub use hooks::{
    identity_gather, identity_scatter, keep_latest_feedback, FeedbackFn, GatherFn, ScatterFn,
};
pub use inbound::InboundComponent;
pub use outbound::OutboundComponent;
pub use translator::EnvelopeTranslator;
