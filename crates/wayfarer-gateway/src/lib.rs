//! HTTP gateway for the trip planner.
//!
//! Serves the single-shot planner (`POST /plan`), the agent event stream
//! over SSE (`POST /plan/stream`), a canned preview stream
//! (`POST /plan/preview`) and a health probe.

pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, start_server};
pub use state::AppState;
