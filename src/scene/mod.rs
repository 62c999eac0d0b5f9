//! Scene graph
//!
//! A minimal node tree handed to the renderer. Nodes are built once and
//! inserted under the root; the scene offers no lookup or removal.

pub mod annotation;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

pub use annotation::{AnnotationBuilder, AnnotationStyle, ApproximateTextMetrics, TextMetrics};

/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const ORANGE: Color = Color::rgb(1.0, 0.5, 0.0);
    pub const CYAN: Color = Color::rgb(0.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// 8-bit sRGB-style channels, clamped
    pub fn to_rgba8(self) -> [u8; 4] {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [channel(self.r), channel(self.g), channel(self.b), channel(self.a)]
    }
}

/// Surface material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse: Color,
    pub specular: Option<Color>,
}

impl Material {
    pub fn diffuse(color: Color) -> Self {
        Self {
            diffuse: color,
            specular: None,
        }
    }
}

/// Font request for 3D text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    /// Family name
    #[serde(rename = "family")]
    pub family: String,
    /// Size in scene units
    #[serde(rename = "size")]
    pub size: f32,
    /// Request the bold trait
    #[serde(rename = "bold", default)]
    pub bold: bool,
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlignment {
    Left,
    Center,
    Right,
}

/// Extruded 3D text
#[derive(Debug, Clone, PartialEq)]
pub struct TextGeometry {
    pub string: String,
    pub extrusion_depth: f32,
    pub font: FontSpec,
    pub alignment: TextAlignment,
    pub chamfer_radius: f32,
    pub material: Material,
    /// Local bounding box (min, max) as measured when the text was built
    pub bounding_box: (Vec3, Vec3),
}

/// Sphere primitive
#[derive(Debug, Clone, PartialEq)]
pub struct SphereGeometry {
    pub radius: f32,
    pub material: Material,
}

/// Renderable geometry attached to a node
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Text(TextGeometry),
    Sphere(SphereGeometry),
}

/// Axes a billboard constraint may rotate about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillboardAxes {
    X,
    Y,
    Z,
    All,
}

/// Rendering constraint applied to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Orient the node toward the viewer, rotating only about `free_axes`
    Billboard { free_axes: BillboardAxes },
}

/// A node in the scene graph
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    position: Vec3,
    scale: Vec3,
    pivot: Mat4,
    geometry: Option<Geometry>,
    constraints: Vec<Constraint>,
    children: Vec<SceneNode>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            pivot: Mat4::IDENTITY,
            geometry: None,
            constraints: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl SceneNode {
    /// Empty grouping node
    pub fn new() -> Self {
        Self::default()
    }

    /// Node carrying geometry
    pub fn with_geometry(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_pivot(mut self, pivot: Mat4) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn pivot(&self) -> Mat4 {
        self.pivot
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    /// Local transform: translate, scale, then undo the pivot
    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(self.scale) * self.pivot.inverse()
    }

    /// First text geometry in this subtree
    pub fn find_text(&self) -> Option<&TextGeometry> {
        match &self.geometry {
            Some(Geometry::Text(text)) => Some(text),
            _ => self.children.iter().find_map(SceneNode::find_text),
        }
    }

    /// First sphere geometry in this subtree
    pub fn find_sphere(&self) -> Option<&SphereGeometry> {
        match &self.geometry {
            Some(Geometry::Sphere(sphere)) => Some(sphere),
            _ => self.children.iter().find_map(SceneNode::find_sphere),
        }
    }
}

/// Root of the rendered scene
#[derive(Debug, Default)]
pub struct Scene {
    root: SceneNode,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under the root
    pub fn add_child_node(&mut self, node: SceneNode) {
        self.root.children.push(node);
    }

    /// Top-level nodes in insertion order
    pub fn nodes(&self) -> &[SceneNode] {
        self.root.children()
    }

    /// Number of top-level nodes
    pub fn node_count(&self) -> usize {
        self.root.children.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_starts_empty() {
        let scene = Scene::new();
        assert_eq!(scene.node_count(), 0);
    }

    #[test]
    fn test_add_child_node() {
        let mut scene = Scene::new();
        scene.add_child_node(SceneNode::new().with_position(Vec3::X));
        scene.add_child_node(SceneNode::new().with_position(Vec3::Y));
        assert_eq!(scene.node_count(), 2);
        assert_eq!(scene.nodes()[1].position(), Vec3::Y);
    }

    #[test]
    fn test_local_transform_applies_pivot() {
        let node = SceneNode::new()
            .with_position(Vec3::new(1.0, 0.0, 0.0))
            .with_pivot(Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0)));
        let origin = node.local_transform().transform_point3(Vec3::new(0.5, 0.0, 0.0));
        assert!((origin - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_color_to_rgba8() {
        assert_eq!(Color::ORANGE.to_rgba8(), [255, 128, 0, 255]);
        assert_eq!(Color::rgb(2.0, -1.0, 0.0).to_rgba8(), [255, 0, 0, 255]);
    }

    #[test]
    fn test_find_geometry_in_children() {
        let sphere = SphereGeometry {
            radius: 0.1,
            material: Material::diffuse(Color::CYAN),
        };
        let parent = SceneNode::new().with_child(SceneNode::with_geometry(Geometry::Sphere(sphere.clone())));
        assert_eq!(parent.find_sphere(), Some(&sphere));
        assert!(parent.find_text().is_none());
    }
}
