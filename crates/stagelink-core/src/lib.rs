//! Stagelink Core - Protocol types and coordination logic
//!
//! This crate provides the foundational types for the Stagelink system:
//! - Wire protocol events exchanged between clients and the relay
//! - Control arbitration state machine for the single-writer grant
//! - Camera pose snapshots with edge-triggered publishing
//! - Versioned scene settings channel
//! - Model catalog descriptors and upload validation

pub mod catalog;
pub mod control;
pub mod pose;
pub mod protocol;
pub mod settings;

pub use catalog::{validate_upload, ModelDescriptor, UploadError, MAX_UPLOAD_BYTES};
pub use control::ControlState;
pub use pose::{CameraPose, PosePublisher, ViewerCamera};
pub use protocol::{ClientEvent, ClientId, ProtocolError, ServerEvent};
pub use settings::{SceneSettings, SettingsReceiver, SettingsSnapshot};
