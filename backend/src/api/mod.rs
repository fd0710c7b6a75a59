//! HTTP API module.
//!
//! Server, request types and the log stream used by every pipeline step.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{build_router, start_server, AppState};
pub use types::*;
