pub mod broker;
pub mod resilience;
pub mod translator;

pub use broker::{BrokerConfig, MIN_BUFFER_SIZE};
pub use resilience::ResilienceConfig;
pub use translator::TranslatorConfig;
