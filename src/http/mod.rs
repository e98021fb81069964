//! HTTP surface: rejection responses, CORS and the decision service.

mod cors;
mod response;
mod server;
mod service;

pub use cors::cors_headers;
pub use response::{build_rejection, build_rejection_with_retry, RATE_LIMIT_MESSAGE};
pub use server::HttpServer;
pub use service::{CheckRequest, CheckResponse, RateLimitService};
