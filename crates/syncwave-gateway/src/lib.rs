mod circuit_breaker;
mod client;
mod error;
mod gateway;
mod http_client;

pub use circuit_breaker::{Admission, CircuitBreaker};
pub use client::{FetchContext, ProviderClient};
pub use error::ProviderError;
pub use gateway::ProviderGateway;
pub use http_client::JsonHttpProviderClient;
