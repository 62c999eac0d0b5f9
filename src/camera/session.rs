//! Desktop world-tracking session
//!
//! Wraps a webcam capture as a [`FrameSource`]. A webcam has no depth, so
//! feature-point hit tests land on a virtual feature plane a fixed distance
//! in front of a fixed pinhole camera. Hits are only reported while the
//! session is running and at least one frame has arrived.

use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;

use super::{CameraCapture, CameraFrame};
use crate::ar::{
    FrameSource, HitTestResult, HitTestType, Viewport, VirtualCamera, WorldTrackingConfiguration,
};
use crate::config::CameraConfig;

/// Webcam-backed AR session
pub struct DesktopArSession {
    config: CameraConfig,
    camera_model: VirtualCamera,
    capture: Mutex<Option<CameraCapture>>,
}

impl DesktopArSession {
    pub fn new(config: CameraConfig) -> Self {
        let camera_model = VirtualCamera::new(config.fov_degrees);
        Self {
            config,
            camera_model,
            capture: Mutex::new(None),
        }
    }

    /// Pinhole model shared with the overlay renderer
    pub fn camera_model(&self) -> VirtualCamera {
        self.camera_model
    }

    /// Whether the capture thread is alive
    pub fn is_running(&self) -> bool {
        self.capture
            .lock()
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    /// Frames captured since the session last started
    pub fn frame_count(&self) -> u64 {
        self.capture
            .lock()
            .as_ref()
            .map(|c| c.frame_count())
            .unwrap_or(0)
    }

    fn has_tracking(&self) -> bool {
        self.capture
            .lock()
            .as_ref()
            .is_some_and(|c| c.is_running() && c.frame_count() > 0)
    }

    /// Hits once tracking is established, filtered by the requested types
    fn tracked_hits(&self, point: Vec2, viewport: Viewport, types: &[HitTestType]) -> Vec<HitTestResult> {
        // Only feature points are tracked; plane detection has no desktop equivalent.
        if !types.contains(&HitTestType::FeaturePoint) {
            return Vec::new();
        }
        self.feature_point_hit(point, viewport).into_iter().collect()
    }

    fn feature_point_hit(&self, point: Vec2, viewport: Viewport) -> Option<HitTestResult> {
        let world = self
            .camera_model
            .intersect_depth_plane(point, viewport, self.config.feature_distance)?;
        Some(HitTestResult::at_point(
            HitTestType::FeaturePoint,
            world,
            world.length(),
        ))
    }
}

impl FrameSource for DesktopArSession {
    fn run(&self, configuration: WorldTrackingConfiguration) {
        let mut capture = self.capture.lock();
        if capture.as_ref().is_some_and(|c| c.is_running()) {
            return;
        }

        log::info!(
            "Starting world tracking (camera {}, plane detection {:?})",
            self.config.index,
            configuration.plane_detection
        );
        match CameraCapture::new(self.config.index, self.config.width, self.config.height) {
            Ok(started) => *capture = Some(started),
            Err(e) => log::error!("Failed to start camera: {}", e),
        }
    }

    fn pause(&self) {
        if let Some(mut capture) = self.capture.lock().take() {
            capture.stop();
            log::info!("World tracking paused");
        }
    }

    fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        self.capture.lock().as_ref()?.latest_frame()
    }

    fn hit_test(&self, point: Vec2, viewport: Viewport, types: &[HitTestType]) -> Vec<HitTestResult> {
        if !self.has_tracking() {
            log::debug!("Hit test before tracking is established");
            return Vec::new();
        }

        self.tracked_hits(point, viewport, types)
    }
}

impl Drop for DesktopArSession {
    fn drop(&mut self) {
        self.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(800.0, 600.0)
    }

    #[test]
    fn test_no_hits_before_run() {
        let session = DesktopArSession::new(CameraConfig::default());
        let hits = session.hit_test(viewport().center(), viewport(), &[HitTestType::FeaturePoint]);
        assert!(hits.is_empty());
        assert!(session.current_frame().is_none());
        assert_eq!(session.frame_count(), 0);
    }

    #[test]
    fn test_feature_point_hit_on_virtual_plane() {
        let config = CameraConfig {
            feature_distance: 0.75,
            ..CameraConfig::default()
        };
        let session = DesktopArSession::new(config);
        let hit = session.feature_point_hit(viewport().center(), viewport()).unwrap();
        assert_eq!(hit.hit_type, HitTestType::FeaturePoint);
        assert!((hit.translation().z + 0.75).abs() < 1e-3);
        assert!((hit.distance - 0.75).abs() < 1e-2);
    }

    #[test]
    fn test_hit_types_filter() {
        let session = DesktopArSession::new(CameraConfig::default());
        let center = viewport().center();

        assert!(session
            .tracked_hits(center, viewport(), &[HitTestType::ExistingPlane])
            .is_empty());
        assert!(session.tracked_hits(center, viewport(), &[]).is_empty());
        assert_eq!(
            session
                .tracked_hits(center, viewport(), &[HitTestType::FeaturePoint])
                .len(),
            1
        );
        assert_eq!(
            session
                .tracked_hits(
                    center,
                    viewport(),
                    &[HitTestType::ExistingPlane, HitTestType::FeaturePoint]
                )
                .len(),
            1
        );
    }

    #[test]
    fn test_pause_without_run_is_noop() {
        let session = DesktopArSession::new(CameraConfig::default());
        session.pause();
        assert!(!session.is_running());
    }
}
