//! Outbound network layer: typed requests, the transport seam, and the
//! resilient client that recovers from expired credentials.

pub mod client;
pub mod config;
pub mod refresh;
pub mod transport;
pub mod types;

pub use client::{ResilientClient, SessionInvalidated};
pub use config::ClientConfig;
pub use transport::{HttpTransport, Transport};
pub use types::{ApiRequest, ApiResponse, ClientError, Method, User};
