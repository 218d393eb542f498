//! Parley backend: axum router, WebSocket gateway, and the HTTP-backed
//! implementations of the external directory traits.
//!
//! The library surface exists so the end-to-end tests can assemble the
//! same router the binary serves.

pub mod directory;
pub mod routes;
pub mod state;
pub mod ws;

pub use routes::build_router;
pub use state::AppState;
