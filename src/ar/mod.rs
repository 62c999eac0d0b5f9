//! World tracking interface
//!
//! The frame source is the AR host: it owns the camera session, hands out
//! the latest frame and answers hit tests against tracked feature points.

pub mod camera_model;

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};

use crate::camera::CameraFrame;

pub use camera_model::VirtualCamera;

/// Plane detection requested from world tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaneDetection {
    None,
    #[default]
    Horizontal,
    Vertical,
}

/// World-tracking session configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldTrackingConfiguration {
    pub plane_detection: PlaneDetection,
}

/// What a hit test is allowed to hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTestType {
    /// Points tracked by the session as part of a continuous surface
    FeaturePoint,
    /// Detected planes, within their extent
    ExistingPlane,
}

/// A single hit-test result
#[derive(Debug, Clone, Copy)]
pub struct HitTestResult {
    /// Kind of tracked element that was hit
    pub hit_type: HitTestType,
    /// Distance from the camera to the hit
    pub distance: f32,
    /// Pose of the hit in world space
    pub world_transform: Mat4,
}

impl HitTestResult {
    /// Create a result at a world-space point
    pub fn at_point(hit_type: HitTestType, point: Vec3, distance: f32) -> Self {
        Self {
            hit_type,
            distance,
            world_transform: Mat4::from_translation(point),
        }
    }

    /// Translation column of the world transform
    pub fn translation(&self) -> Vec3 {
        self.world_transform.w_axis.truncate()
    }
}

/// Size of the view the scene is presented in, in logical points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Midpoint of the view bounds
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Width over height, 1.0 for degenerate sizes
    pub fn aspect(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// Host AR session: frames, lifecycle and hit testing
pub trait FrameSource: Send + Sync {
    /// Start (or restart) world tracking
    fn run(&self, configuration: WorldTrackingConfiguration);

    /// Pause world tracking; frames and hits stop until `run` is called again
    fn pause(&self);

    /// Most recent camera frame, if any has been captured
    fn current_frame(&self) -> Option<Arc<CameraFrame>>;

    /// Hit-test a point in view coordinates, closest result first
    fn hit_test(&self, point: Vec2, viewport: Viewport, types: &[HitTestType]) -> Vec<HitTestResult>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_center() {
        let viewport = Viewport::new(1280.0, 720.0);
        assert_eq!(viewport.center(), Vec2::new(640.0, 360.0));
        assert!((viewport.aspect() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_viewport_aspect() {
        assert_eq!(Viewport::new(0.0, 0.0).aspect(), 1.0);
    }

    #[test]
    fn test_hit_result_translation() {
        let hit = HitTestResult::at_point(HitTestType::FeaturePoint, Vec3::new(0.1, -0.2, -0.5), 0.5);
        assert_eq!(hit.translation(), Vec3::new(0.1, -0.2, -0.5));
    }

    #[test]
    fn test_translation_ignores_rotation() {
        let transform = Mat4::from_rotation_translation(
            glam::Quat::from_rotation_y(1.0),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let hit = HitTestResult {
            hit_type: HitTestType::FeaturePoint,
            distance: 3.7,
            world_transform: transform,
        };
        assert_eq!(hit.translation(), Vec3::new(1.0, 2.0, 3.0));
    }
}
