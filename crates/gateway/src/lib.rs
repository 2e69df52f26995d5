//! Typed request/response boundary to the Flux generation service.
//!
//! [`Gateway`] is the seam every poller and action goes through;
//! [`FluxApi`] implements it over HTTP with [`reqwest`]. The gateway is
//! stateless and never retries on its own: periodic callers retry by
//! running again on their next tick.

pub mod api;
pub mod error;
pub mod gateway;

pub use api::FluxApi;
pub use error::GatewayError;
pub use gateway::Gateway;
