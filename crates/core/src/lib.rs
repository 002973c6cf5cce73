pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::{BrokerConfig, ResilienceConfig, TranslatorConfig, MIN_BUFFER_SIZE};
pub use errors::{RelayError, RelayResult};
pub use logging::init_logging;
pub use models::{
    ComponentRegistration, Delivery, DispatchRequest, DispatcherHandle, JobMessage, RouterMessage,
    Verdict, ROUTE_ACK, ROUTE_FAIL,
};
pub use traits::{InboundEndpoint, OutboundEndpoint, SharedCache};
