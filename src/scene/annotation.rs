//! Annotation node construction
//!
//! An annotation is a billboarded 3D text label sitting on top of a small
//! sphere marker. The text pivot is moved to its bottom-centre so the label
//! grows upward from the anchor point.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::{
    BillboardAxes, Color, Constraint, FontSpec, Geometry, Material, SceneNode, SphereGeometry,
    TextAlignment, TextGeometry,
};

/// Visual constants for annotation nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationStyle {
    /// Depth of the extruded text
    #[serde(rename = "extrusionDepth", default = "default_extrusion_depth")]
    pub extrusion_depth: f32,
    /// Text font
    #[serde(rename = "font", default = "default_font")]
    pub font: FontSpec,
    /// Text diffuse color
    #[serde(rename = "textColor", default = "default_text_color")]
    pub text_color: Color,
    /// Text specular color
    #[serde(rename = "specularColor", default = "default_specular_color")]
    pub specular_color: Color,
    /// Edge chamfer; large values make text meshing unstable
    #[serde(rename = "chamferRadius", default = "default_extrusion_depth")]
    pub chamfer_radius: f32,
    /// Uniform scale applied to the text node
    #[serde(rename = "textScale", default = "default_text_scale")]
    pub text_scale: f32,
    /// Radius of the sphere marker
    #[serde(rename = "markerRadius", default = "default_marker_radius")]
    pub marker_radius: f32,
    /// Sphere marker color
    #[serde(rename = "markerColor", default = "default_marker_color")]
    pub marker_color: Color,
}

fn default_extrusion_depth() -> f32 {
    0.05
}
fn default_font() -> FontSpec {
    FontSpec {
        family: "PingFangSC-Ultralight".to_string(),
        size: 0.15,
        bold: true,
    }
}
fn default_text_color() -> Color {
    Color::ORANGE
}
fn default_specular_color() -> Color {
    Color::WHITE
}
fn default_text_scale() -> f32 {
    0.2
}
fn default_marker_radius() -> f32 {
    0.005
}
fn default_marker_color() -> Color {
    Color::CYAN
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            extrusion_depth: default_extrusion_depth(),
            font: default_font(),
            text_color: default_text_color(),
            specular_color: default_specular_color(),
            chamfer_radius: default_extrusion_depth(),
            text_scale: default_text_scale(),
            marker_radius: default_marker_radius(),
            marker_color: default_marker_color(),
        }
    }
}

/// Host text measurement
pub trait TextMetrics: Send + Sync {
    /// Local bounding box (min, max) of `text` extruded to `depth`
    fn bounding_box(&self, text: &str, font: &FontSpec, depth: f32) -> (Vec3, Vec3);
}

/// Fixed per-character advance, good enough for condensed UI fonts
#[derive(Debug, Clone, Copy)]
pub struct ApproximateTextMetrics {
    /// Advance per character as a fraction of font size
    pub advance: f32,
    /// Extra advance for bold faces, as a fraction of font size
    pub bold_extra: f32,
    /// Height above the baseline, as a fraction of font size
    pub ascent: f32,
    /// Depth below the baseline, as a fraction of font size
    pub descent: f32,
}

impl Default for ApproximateTextMetrics {
    fn default() -> Self {
        Self {
            advance: 0.5,
            bold_extra: 0.05,
            ascent: 0.8,
            descent: 0.2,
        }
    }
}

impl TextMetrics for ApproximateTextMetrics {
    fn bounding_box(&self, text: &str, font: &FontSpec, depth: f32) -> (Vec3, Vec3) {
        let advance = if font.bold {
            self.advance + self.bold_extra
        } else {
            self.advance
        };
        let width = text.chars().count() as f32 * advance * font.size;
        (
            Vec3::new(0.0, -self.descent * font.size, 0.0),
            Vec3::new(width, self.ascent * font.size, depth),
        )
    }
}

/// Builds annotation nodes from label text
pub struct AnnotationBuilder {
    style: AnnotationStyle,
    metrics: Box<dyn TextMetrics>,
}

impl AnnotationBuilder {
    pub fn new(style: AnnotationStyle) -> Self {
        Self::with_metrics(style, ApproximateTextMetrics::default())
    }

    pub fn with_metrics(style: AnnotationStyle, metrics: impl TextMetrics + 'static) -> Self {
        Self {
            style,
            metrics: Box::new(metrics),
        }
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Text node pivot that puts the bottom-centre of the text at the origin
    pub fn bottom_center_pivot(min: Vec3, max: Vec3, depth: f32) -> Mat4 {
        let width = max.x - min.x;
        Mat4::from_translation(Vec3::new(min.x + width / 2.0, min.y, depth / 2.0))
    }

    /// Build a text label over a sphere marker, grouped under a Y-billboarded parent
    pub fn build(&self, text: &str) -> SceneNode {
        let style = &self.style;
        let depth = style.extrusion_depth;

        let bounding_box = self.metrics.bounding_box(text, &style.font, depth);
        let (min, max) = bounding_box;

        let text_geometry = TextGeometry {
            string: text.to_string(),
            extrusion_depth: depth,
            font: style.font.clone(),
            alignment: TextAlignment::Center,
            chamfer_radius: style.chamfer_radius,
            material: Material {
                diffuse: style.text_color,
                specular: Some(style.specular_color),
            },
            bounding_box,
        };

        let text_node = SceneNode::with_geometry(Geometry::Text(text_geometry))
            .with_pivot(Self::bottom_center_pivot(min, max, depth))
            .with_scale(Vec3::splat(style.text_scale));

        let marker_node = SceneNode::with_geometry(Geometry::Sphere(SphereGeometry {
            radius: style.marker_radius,
            material: Material::diffuse(style.marker_color),
        }));

        SceneNode::new()
            .with_child(text_node)
            .with_child(marker_node)
            .with_constraints(vec![Constraint::Billboard {
                free_axes: BillboardAxes::Y,
            }])
    }
}

impl Default for AnnotationBuilder {
    fn default() -> Self {
        Self::new(AnnotationStyle::default())
    }
}
