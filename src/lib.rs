//! Session-authentication resilience layer.
//!
//! ARCHITECTURE
//! ============
//! - [`gate`]: edge route gate deciding proceed/redirect from the path and
//!   credential-cookie presence.
//! - [`net`]: resilient request client; one shared token refresh per burst
//!   of expired-credential responses, each call replayed at most once.
//! - [`session`]: the belief store consumers read to learn who is signed in.

pub mod config;
pub mod error;
pub mod gate;
pub mod net;
pub mod session;

pub use error::{ConfigError, ErrorCode};
pub use gate::{GateConfig, GateDecision, RouteClass, RouteGate};
pub use net::{ApiRequest, ApiResponse, ClientConfig, ClientError, ResilientClient, SessionInvalidated, User};
pub use session::{AuthStatus, Session, SessionStore};
