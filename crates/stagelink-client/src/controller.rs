//! Controller role: single-writer camera/settings publishing and uploads

use serde_json::Value;
use stagelink_core::{
    validate_upload, CameraPose, ClientEvent, ControlState, PosePublisher, SceneSettings,
    ServerEvent,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::connection::RelayConnection;
use crate::error::ClientError;

const PRESIGN_TIMEOUT: Duration = Duration::from_secs(10);

/// A controller client: owns the arbitration state, the pose publisher
/// and both settings channels, all gated on holding control.
pub struct Controller {
    conn: RelayConnection,
    control: ControlState,
    publisher: PosePublisher,
    scene: SceneSettings,
    camera_settings: SceneSettings,
    known_models: Vec<String>,
    http: reqwest::Client,
}

impl Controller {
    pub fn new(conn: RelayConnection) -> Self {
        Self {
            conn,
            control: ControlState::default(),
            publisher: PosePublisher::new(),
            scene: SceneSettings::new(),
            camera_settings: SceneSettings::new(),
            known_models: Vec::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Use the throttled pose publisher variant
    pub fn with_pose_throttle(conn: RelayConnection, interval: Duration) -> Self {
        let mut controller = Self::new(conn);
        controller.publisher = PosePublisher::with_throttle(interval);
        controller
    }

    pub fn connection(&self) -> &RelayConnection {
        &self.conn
    }

    /// Ask the relay for the single-writer grant. One-shot: repeated calls
    /// emit nothing.
    pub fn request_control(&mut self) {
        if self.control.request() {
            self.conn.emit(ClientEvent::RequestControl);
        }
    }

    /// Feed a relay event into the arbitration state
    pub fn on_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::ControlGranted => {
                info!("Control granted");
                self.control.grant();
            }
            ServerEvent::ControlDenied => {
                info!("Control denied, another controller is active");
                self.control.deny();
            }
            ServerEvent::FilesList(models) => {
                self.known_models = models.iter().map(|m| m.name.clone()).collect();
            }
            ServerEvent::ModelUploaded { file_name, .. } => {
                if !self.known_models.contains(file_name) {
                    self.known_models.push(file_name.clone());
                }
            }
            _ => {}
        }
    }

    /// The transport dropped: control must be re-requested and the next
    /// pose must be re-sent even if unchanged.
    pub fn on_disconnected(&mut self) {
        self.control.reset();
        self.publisher.reset();
    }

    pub fn has_control(&self) -> bool {
        self.control.has_control()
    }

    pub fn control_state(&self) -> ControlState {
        self.control
    }

    /// Called once per rendered frame with the live camera pose. Emits only
    /// when this client holds control and the pose changed since the last
    /// emission. Returns whether an event went out.
    pub fn publish_pose(&mut self, pose: &CameraPose) -> bool {
        if !self.control.has_control() {
            return false;
        }
        if !self.publisher.should_emit(pose) {
            return false;
        }
        self.conn.emit(ClientEvent::CameraUpdate(pose.clone()));
        true
    }

    /// Merge one scene setting and republish the whole map if granted
    pub fn update_setting(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.scene.set(key, value);
        if self.control.has_control() {
            self.conn
                .emit(ClientEvent::SettingsUpdate(self.scene.snapshot()));
        }
    }

    /// Merge one controller-local camera setting and republish if granted
    pub fn update_camera_setting(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.camera_settings.set(key, value);
        if self.control.has_control() {
            self.conn
                .emit(ClientEvent::SettingsUpdateLocal(self.camera_settings.snapshot()));
        }
    }

    pub fn settings(&self) -> &SceneSettings {
        &self.scene
    }

    /// Ask the relay for the current catalog
    pub fn refresh_catalog(&self) {
        self.conn.emit(ClientEvent::GetFiles);
    }

    /// Upload a model through the presigned-URL handshake:
    /// validate locally, request an upload target, PUT the file, then
    /// finalize with `upload_complete`. No relay traffic happens for files
    /// that fail validation.
    pub async fn upload(
        &mut self,
        path: &Path,
        author: Option<String>,
        folder: Option<String>,
    ) -> Result<(), ClientError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = tokio::fs::metadata(path).await?.len();

        validate_upload(&file_name, size, &self.known_models)?;

        let mut events = self.conn.subscribe();
        self.conn.emit(ClientEvent::RequestPresignedUrl {
            file_name: file_name.clone(),
            file_type: content_type_for(&file_name).to_string(),
        });

        let upload_url = wait_for_presigned(&mut events, &file_name).await?;
        debug!(file = %file_name, url = %upload_url, "Received upload target");

        let bytes = tokio::fs::read(path).await?;
        let response = self
            .http
            .put(&upload_url)
            .header("content-type", content_type_for(&file_name))
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Upload(format!(
                "PUT returned {}",
                response.status()
            )));
        }

        self.conn.emit(ClientEvent::UploadComplete {
            file_name: file_name.clone(),
            author,
            folder,
        });
        info!(file = %file_name, "Upload complete");
        Ok(())
    }
}

async fn wait_for_presigned(
    events: &mut tokio::sync::broadcast::Receiver<ServerEvent>,
    file_name: &str,
) -> Result<String, ClientError> {
    let deadline = tokio::time::Instant::now() + PRESIGN_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let event = tokio::time::timeout(remaining, events.recv())
            .await
            .map_err(|_| ClientError::Timeout("presigned_url"))?
            .map_err(|_| ClientError::Disconnected)?;

        match event {
            ServerEvent::PresignedUrl {
                upload_url,
                file_name: name,
            } if name == file_name => return Ok(upload_url),
            ServerEvent::PresignedUrlError { message } => {
                return Err(ClientError::Upload(message));
            }
            _ => {}
        }
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "glb" => "model/gltf-binary",
        Some(ext) if ext == "gltf" => "model/gltf+json",
        Some(ext) if ext == "stl" => "model/stl",
        Some(ext) if ext == "obj" => "model/obj",
        _ => "application/octet-stream",
    }
}
