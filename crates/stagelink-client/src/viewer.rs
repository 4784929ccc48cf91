//! Viewer role: applies incoming pose and settings events

use stagelink_core::{
    ClientEvent, ModelDescriptor, ServerEvent, SettingsReceiver, ViewerCamera,
};
use tracing::debug;

use crate::connection::RelayConnection;

/// A viewer client: passively consumes relay events and mutates local
/// camera/settings/catalog state. Multiple viewers need no coordination
/// since they only read.
pub struct Viewer {
    conn: RelayConnection,
    pub camera: ViewerCamera,
    scene: SettingsReceiver,
    camera_settings: SettingsReceiver,
    models: Vec<ModelDescriptor>,
    active_index: usize,
}

impl Viewer {
    pub fn new(conn: RelayConnection) -> Self {
        Self {
            conn,
            camera: ViewerCamera::default(),
            scene: SettingsReceiver::new(),
            camera_settings: SettingsReceiver::new(),
            models: Vec::new(),
            active_index: 0,
        }
    }

    pub fn connection(&self) -> &RelayConnection {
        &self.conn
    }

    /// Ask the relay for the current catalog
    pub fn refresh_catalog(&self) {
        self.conn.emit(ClientEvent::GetFiles);
    }

    /// Announce the active model to the other clients
    pub fn announce_model_switch(&mut self, index: usize) {
        self.active_index = index;
        self.conn.emit(ClientEvent::ModelSwitch { index });
    }

    /// Apply one relay event to local state
    pub fn apply_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::CameraUpdate(pose) => {
                self.camera.apply(pose);
            }
            ServerEvent::SettingsUpdate(snapshot) => {
                if !self.scene.apply(snapshot.clone()) {
                    debug!(version = snapshot.version, "Discarded stale settings snapshot");
                }
            }
            ServerEvent::SettingsUpdateLocal(snapshot) => {
                if !self.camera_settings.apply(snapshot.clone()) {
                    debug!(version = snapshot.version, "Discarded stale camera settings snapshot");
                }
            }
            ServerEvent::FilesList(models) => {
                self.models = models.clone();
            }
            ServerEvent::ModelUploaded { file_name, .. } => {
                debug!(model = %file_name, "New model uploaded, refreshing catalog");
                self.refresh_catalog();
            }
            ServerEvent::ModelSwitch { index } => {
                self.active_index = *index;
            }
            _ => {}
        }
    }

    pub fn scene_settings(&self) -> &SettingsReceiver {
        &self.scene
    }

    pub fn camera_settings(&self) -> &SettingsReceiver {
        &self.camera_settings
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }
}
