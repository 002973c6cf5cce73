//! # 数据模型
//!
//! 定义内部总线的核心数据结构：完整的作业消息、跨总线的紧凑消息、
//! 组件注册信息以及通道上的请求/投递类型。所有跨组件的消息都实现
//! 稳定的二进制编码（serde_json 字节），与实现语言无关。

pub mod bus;
pub mod message;
pub mod registration;

pub use bus::*;
pub use message::*;
pub use registration::*;
