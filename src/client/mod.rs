//! Rate-governed HTTP access to the provider API

pub mod config;
pub mod http;
pub mod ratelimit;

pub use config::{ClientConfig, ClientConfigBuilder, RateTier, API_REVISION, DEFAULT_BASE_URL};
pub use http::{KlaviyoClient, RequestPolicy, ServerHints};
pub use ratelimit::RateLimiter;
