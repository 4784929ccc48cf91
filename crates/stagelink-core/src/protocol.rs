//! Wire protocol events exchanged over the relay WebSocket
//!
//! Events are JSON-encoded as `{ "type": "...", "data": ... }` so that
//! clients can dispatch on the tag without knowing every payload shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::ModelDescriptor;
use crate::pose::CameraPose;
use crate::settings::SettingsSnapshot;

/// Unique identifier for a connected client, assigned per connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected binary frame")]
    BinaryFrame,
}

/// Events sent from a client to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    /// Ask to become the single writer for camera/settings updates
    #[serde(rename = "request_control")]
    RequestControl,
    /// Publish the current camera pose (holder only)
    #[serde(rename = "camera_update")]
    CameraUpdate(CameraPose),
    /// Publish the scene settings map wholesale (holder only)
    #[serde(rename = "settings_update")]
    SettingsUpdate(SettingsSnapshot),
    /// Publish controller-local camera settings (holder only)
    #[serde(rename = "settings_update_local")]
    SettingsUpdateLocal(SettingsSnapshot),
    /// Request the current asset catalog
    #[serde(rename = "get_files")]
    GetFiles,
    /// Begin the presigned upload handshake
    #[serde(rename = "request_presigned_url")]
    RequestPresignedUrl { file_name: String, file_type: String },
    /// Finalize upload bookkeeping after a successful PUT
    #[serde(rename = "upload_complete")]
    UploadComplete {
        file_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder: Option<String>,
    },
    /// Announce the active model index
    #[serde(rename = "model_switch")]
    ModelSwitch { index: usize },
}

/// Events delivered from the relay to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    /// Arbitration result: this client is now the single writer
    #[serde(rename = "control_granted")]
    ControlGranted,
    /// Arbitration result: another controller is active
    #[serde(rename = "control_denied")]
    ControlDenied,
    /// Camera pose published by the current holder
    #[serde(rename = "camera_update")]
    CameraUpdate(CameraPose),
    /// Scene settings published by the current holder
    #[serde(rename = "settings_update")]
    SettingsUpdate(SettingsSnapshot),
    /// Controller-local camera settings from the current holder
    #[serde(rename = "settings_update_local")]
    SettingsUpdateLocal(SettingsSnapshot),
    /// Current asset catalog
    #[serde(rename = "files_list")]
    FilesList(Vec<ModelDescriptor>),
    /// Upload target for the presigned handshake
    #[serde(rename = "presigned_url")]
    PresignedUrl { upload_url: String, file_name: String },
    /// Presigned handshake failure
    #[serde(rename = "presigned_url_error")]
    PresignedUrlError { message: String },
    /// A new asset is available
    #[serde(rename = "model_uploaded")]
    ModelUploaded {
        file_name: String,
        model_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },
    /// Active model index announced by another client
    #[serde(rename = "model_switch")]
    ModelSwitch { index: usize },
    /// Keepalive answer
    #[serde(rename = "pong")]
    Pong,
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
