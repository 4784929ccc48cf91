//! Camera pose snapshots and edge-triggered publishing

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A camera pose sampled from the controller's live camera
///
/// `rotation` holds unit quaternion components in x, y, z, w order. `zoom`
/// is optional because not every page variant publishes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f32>,
}

/// Decides, once per rendered frame, whether the current pose should be
/// emitted. Emission is edge-triggered: an identical consecutive snapshot
/// never produces a second event. An optional minimum interval additionally
/// bounds event volume for callers that want the throttled variant.
#[derive(Debug, Default)]
pub struct PosePublisher {
    last_sent: Option<CameraPose>,
    min_interval: Option<Duration>,
    last_sent_at: Option<Instant>,
}

impl PosePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress emissions closer together than `interval`
    pub fn with_throttle(interval: Duration) -> Self {
        Self {
            min_interval: Some(interval),
            ..Self::default()
        }
    }

    /// Returns true if `pose` should be emitted now, recording it as the
    /// last-sent snapshot when it is.
    pub fn should_emit(&mut self, pose: &CameraPose) -> bool {
        self.should_emit_at(pose, Instant::now())
    }

    fn should_emit_at(&mut self, pose: &CameraPose, now: Instant) -> bool {
        if self.last_sent.as_ref() == Some(pose) {
            return false;
        }
        if let (Some(interval), Some(sent_at)) = (self.min_interval, self.last_sent_at) {
            if now.duration_since(sent_at) < interval {
                return false;
            }
        }
        self.last_sent = Some(pose.clone());
        self.last_sent_at = Some(now);
        true
    }

    /// Forget the last-sent snapshot, forcing the next pose to be emitted
    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_sent_at = None;
    }
}

/// Viewer-side camera state driven by incoming pose events
///
/// Updates are applied as discrete jumps with no interpolation. A zoom
/// change marks the projection dirty so the renderer refreshes its
/// projection matrix on the next frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerCamera {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub zoom: f32,
    projection_dirty: bool,
}

impl Default for ViewerCamera {
    fn default() -> Self {
        Self {
            position: [15.0, 15.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            zoom: 1.0,
            projection_dirty: false,
        }
    }
}

impl ViewerCamera {
    /// Overwrite this camera with the incoming pose, exactly
    pub fn apply(&mut self, pose: &CameraPose) {
        self.position = pose.position;
        self.rotation = pose.rotation;
        if let Some(zoom) = pose.zoom {
            if zoom != self.zoom {
                self.zoom = zoom;
                self.projection_dirty = true;
            }
        }
    }

    /// True if a zoom change is waiting for a projection-matrix refresh
    pub fn projection_dirty(&self) -> bool {
        self.projection_dirty
    }

    /// Called by the renderer after rebuilding the projection matrix
    pub fn clear_projection_dirty(&mut self) {
        self.projection_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(x: f32) -> CameraPose {
        CameraPose {
            position: [x, 15.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            zoom: None,
        }
    }

    #[test]
    fn test_identical_pose_emitted_once() {
        let mut publisher = PosePublisher::new();
        assert!(publisher.should_emit(&pose(1.0)));
        assert!(!publisher.should_emit(&pose(1.0)));
        assert!(publisher.should_emit(&pose(2.0)));
        assert!(!publisher.should_emit(&pose(2.0)));
    }

    #[test]
    fn test_throttle_suppresses_rapid_changes() {
        let mut publisher = PosePublisher::with_throttle(Duration::from_millis(20));
        let start = Instant::now();
        assert!(publisher.should_emit_at(&pose(1.0), start));
        // Changed pose, but inside the interval
        assert!(!publisher.should_emit_at(&pose(2.0), start + Duration::from_millis(5)));
        assert!(publisher.should_emit_at(&pose(2.0), start + Duration::from_millis(25)));
    }

    #[test]
    fn test_reset_forces_reemission() {
        let mut publisher = PosePublisher::new();
        assert!(publisher.should_emit(&pose(1.0)));
        publisher.reset();
        assert!(publisher.should_emit(&pose(1.0)));
    }

    #[test]
    fn test_viewer_camera_applies_pose_exactly() {
        let mut camera = ViewerCamera::default();
        let incoming = CameraPose {
            position: [1.0, 2.0, 3.0],
            rotation: [0.1, 0.2, 0.3, 0.9],
            zoom: Some(2.5),
        };
        camera.apply(&incoming);
        assert_eq!(camera.position, incoming.position);
        assert_eq!(camera.rotation, incoming.rotation);
        assert_eq!(camera.zoom, 2.5);
        assert!(camera.projection_dirty());

        camera.clear_projection_dirty();
        assert!(!camera.projection_dirty());
    }

    #[test]
    fn test_pose_without_zoom_keeps_projection_clean() {
        let mut camera = ViewerCamera::default();
        camera.apply(&pose(1.0));
        assert!(!camera.projection_dirty());
        assert_eq!(camera.position, [1.0, 15.0, 0.0]);
    }
}
