//! Virtual pinhole camera used for hit testing and overlay projection
//!
//! The camera sits at a fixed eye position looking down -Z with +Y up,
//! matching the right-handed world space that hit-test results live in.

use glam::{Mat4, Vec2, Vec3};

use super::Viewport;

/// A screen-space projection of a world point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    /// Position in view coordinates (points, origin top-left)
    pub position: Vec2,
    /// Distance along the viewing direction
    pub depth: f32,
}

/// Fixed pinhole camera
#[derive(Debug, Clone, Copy)]
pub struct VirtualCamera {
    /// Vertical field of view in radians
    fov_y: f32,
    /// Near clipping plane
    near: f32,
    /// Far clipping plane
    far: f32,
    /// Camera position in world space
    eye: Vec3,
}

impl VirtualCamera {
    /// Create a camera at the world origin with the given vertical FOV
    pub fn new(fov_y_degrees: f32) -> Self {
        Self {
            fov_y: fov_y_degrees.clamp(1.0, 179.0).to_radians(),
            near: 0.01,
            far: 100.0,
            eye: Vec3::ZERO,
        }
    }

    /// Vertical field of view in radians
    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.eye - Vec3::Z, Vec3::Y)
    }

    /// Get the projection matrix for a viewport
    pub fn projection_matrix(&self, viewport: Viewport) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, viewport.aspect(), self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self, viewport: Viewport) -> Mat4 {
        self.projection_matrix(viewport) * self.view_matrix()
    }

    /// Convert view coordinates to normalized device coordinates
    pub fn screen_to_ndc(point: Vec2, viewport: Viewport) -> Vec2 {
        let width = viewport.width.max(1.0);
        let height = viewport.height.max(1.0);
        Vec2::new(point.x / width * 2.0 - 1.0, 1.0 - point.y / height * 2.0)
    }

    /// World-space ray through a view point: (origin on the near plane, unit direction)
    pub fn ray(&self, point: Vec2, viewport: Viewport) -> (Vec3, Vec3) {
        let ndc = Self::screen_to_ndc(point, viewport);
        let inverse = self.view_projection_matrix(viewport).inverse();
        // perspective_rh maps depth to [0, 1]
        let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
        let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        (near, (far - near).normalize())
    }

    /// Intersect the ray through `point` with the plane `distance` metres in front of the eye
    pub fn intersect_depth_plane(&self, point: Vec2, viewport: Viewport, distance: f32) -> Option<Vec3> {
        if distance <= self.near {
            return None;
        }
        let (origin, direction) = self.ray(point, viewport);
        if direction.z >= 0.0 {
            return None;
        }
        let plane_z = self.eye.z - distance;
        let t = (plane_z - origin.z) / direction.z;
        (t > 0.0).then(|| origin + direction * t)
    }

    /// Project a world point into view coordinates; `None` behind the camera
    pub fn project(&self, world: Vec3, viewport: Viewport) -> Option<Projected> {
        let in_view = self.view_matrix().transform_point3(world);
        let depth = -in_view.z;
        if depth <= self.near {
            return None;
        }
        let ndc = self.projection_matrix(viewport).project_point3(in_view);
        let position = Vec2::new(
            (ndc.x + 1.0) * 0.5 * viewport.width,
            (1.0 - ndc.y) * 0.5 * viewport.height,
        );
        Some(Projected { position, depth })
    }

    /// How many view points one metre spans at a given depth
    pub fn points_per_metre(&self, depth: f32, viewport: Viewport) -> f32 {
        let visible_height = 2.0 * (self.fov_y * 0.5).tan() * depth.max(self.near);
        viewport.height / visible_height
    }
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self::new(60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(1280.0, 720.0)
    }

    #[test]
    fn test_center_ray_points_forward() {
        let camera = VirtualCamera::default();
        let (_, direction) = camera.ray(viewport().center(), viewport());
        assert!(direction.x.abs() < 1e-3);
        assert!(direction.y.abs() < 1e-3);
        assert!(direction.z < -0.999);
    }

    #[test]
    fn test_center_hits_plane_straight_ahead() {
        let camera = VirtualCamera::default();
        let hit = camera
            .intersect_depth_plane(viewport().center(), viewport(), 0.5)
            .unwrap();
        assert!(hit.x.abs() < 1e-3);
        assert!(hit.y.abs() < 1e-3);
        assert!((hit.z + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_project_unproject_consistent() {
        let camera = VirtualCamera::new(70.0);
        let point = Vec2::new(300.0, 150.0);
        let hit = camera.intersect_depth_plane(point, viewport(), 2.0).unwrap();
        let projected = camera.project(hit, viewport()).unwrap();
        assert!((projected.position - point).length() < 0.5);
        assert!((projected.depth - 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_points_behind_camera_not_projected() {
        let camera = VirtualCamera::default();
        assert!(camera.project(Vec3::new(0.0, 0.0, 1.0), viewport()).is_none());
    }

    #[test]
    fn test_points_per_metre_shrinks_with_depth() {
        let camera = VirtualCamera::default();
        let near = camera.points_per_metre(0.5, viewport());
        let far = camera.points_per_metre(1.0, viewport());
        assert!((near / far - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_plane_closer_than_near_clip_misses() {
        let camera = VirtualCamera::default();
        assert!(camera.intersect_depth_plane(viewport().center(), viewport(), 0.0).is_none());
    }
}
