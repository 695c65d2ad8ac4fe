//! Web layer for the fuel finder server.
//!
//! Re-exposes the upstream batch endpoints through the cached client and
//! serves the merged node registry.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
