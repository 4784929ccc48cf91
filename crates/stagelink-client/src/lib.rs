//! Stagelink Client - Native controller and viewer roles
//!
//! Wraps an auto-reconnecting WebSocket connection to a Stagelink relay
//! and exposes the two client roles:
//! - [`Controller`]: requests the single-writer grant, publishes camera
//!   poses and settings, and drives the presigned upload handshake.
//! - [`Viewer`]: applies incoming pose/settings events to local state and
//!   mirrors the model catalog.

pub mod connection;
pub mod controller;
pub mod error;
pub mod viewer;

pub use connection::{ConnectOptions, RelayConnection};
pub use controller::Controller;
pub use error::ClientError;
pub use viewer::Viewer;
