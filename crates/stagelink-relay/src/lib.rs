//! Stagelink Relay - WebSocket coordination and model store
//!
//! Library surface for the relay daemon so integration tests (and
//! embedders) can assemble the router against an in-process state.

pub mod api;
pub mod config;
pub mod presign;
pub mod server;
pub mod state;
pub mod store;
pub mod ws;

pub use config::Config;
pub use state::AppState;
