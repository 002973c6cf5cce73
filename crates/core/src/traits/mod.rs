pub mod cache;
pub mod endpoint;

pub use cache::SharedCache;
pub use endpoint::{InboundEndpoint, OutboundEndpoint};
