//! Annotation overlay
//!
//! Annotations are projected through the session's pinhole model and drawn
//! in screen space, so they always face the viewer and stay upright. Text
//! size shrinks with distance the way the extruded label would.

use glam::{Vec2, Vec3};

use crate::ar::{Viewport, VirtualCamera};
use crate::scene::{Color, Scene, SceneNode};

/// Smallest and largest label size, in points
const MIN_FONT_SIZE: f32 = 8.0;
const MAX_FONT_SIZE: f32 = 96.0;

/// Marker radius floor so distant markers stay visible
const MIN_MARKER_RADIUS: f32 = 2.0;

/// Screen-space placement of one annotation
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationLayout {
    /// Marker centre in view points
    pub anchor: Vec2,
    /// Distance along the view axis
    pub depth: f32,
    pub marker_radius: f32,
    pub marker_color: Color,
    pub label: String,
    pub font_size: f32,
    pub text_color: Color,
}

fn layout_node(node: &SceneNode, camera: &VirtualCamera, viewport: Viewport) -> Option<AnnotationLayout> {
    let projected = camera.project(node.position(), viewport)?;
    let points_per_metre = camera.points_per_metre(projected.depth, viewport);

    let (marker_radius, marker_color) = node
        .find_sphere()
        .map(|sphere| (sphere.radius, sphere.material.diffuse))
        .unwrap_or((0.0, Color::WHITE));

    let text_node = node
        .children()
        .iter()
        .find(|child| child.find_text().is_some());
    let text = node.find_text()?;
    let text_scale = text_node.map(|n| n.scale()).unwrap_or(Vec3::ONE);

    let font_size = (text.font.size * text_scale.y * points_per_metre).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);

    Some(AnnotationLayout {
        anchor: projected.position,
        depth: projected.depth,
        marker_radius: (marker_radius * points_per_metre).max(MIN_MARKER_RADIUS),
        marker_color,
        label: text.string.clone(),
        font_size,
        text_color: text.material.diffuse,
    })
}

/// Visible annotations, farthest first
pub fn layout_annotations(scene: &Scene, camera: &VirtualCamera, viewport: Viewport) -> Vec<AnnotationLayout> {
    let mut layouts: Vec<AnnotationLayout> = scene
        .nodes()
        .iter()
        .filter_map(|node| layout_node(node, camera, viewport))
        .collect();
    layouts.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    layouts
}

fn color32(color: Color) -> egui::Color32 {
    let [r, g, b, a] = color.to_rgba8();
    egui::Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Paint every visible annotation
pub fn paint_annotations(painter: &egui::Painter, scene: &Scene, camera: &VirtualCamera, viewport: Viewport) {
    for layout in layout_annotations(scene, camera, viewport) {
        let anchor = egui::pos2(layout.anchor.x, layout.anchor.y);

        painter.circle_filled(anchor, layout.marker_radius, color32(layout.marker_color));

        let text_pos = anchor - egui::vec2(0.0, layout.marker_radius);
        painter.text(
            text_pos + egui::vec2(1.0, 1.0),
            egui::Align2::CENTER_BOTTOM,
            &layout.label,
            egui::FontId::proportional(layout.font_size),
            egui::Color32::from_black_alpha(160),
        );
        painter.text(
            text_pos,
            egui::Align2::CENTER_BOTTOM,
            &layout.label,
            egui::FontId::proportional(layout.font_size),
            color32(layout.text_color),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::AnnotationBuilder;

    fn viewport() -> Viewport {
        Viewport::new(1280.0, 720.0)
    }

    #[test]
    fn test_centered_annotation_projects_to_center() {
        let mut scene = Scene::new();
        scene.add_child_node(
            AnnotationBuilder::default()
                .build("dog")
                .with_position(Vec3::new(0.0, 0.0, -0.5)),
        );

        let layouts = layout_annotations(&scene, &VirtualCamera::default(), viewport());
        assert_eq!(layouts.len(), 1);
        let layout = &layouts[0];
        assert!((layout.anchor - viewport().center()).length() < 0.5);
        assert_eq!(layout.label, "dog");
        assert_eq!(layout.text_color, Color::ORANGE);
        assert_eq!(layout.marker_color, Color::CYAN);
        assert!((layout.depth - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_behind_camera_is_skipped() {
        let mut scene = Scene::new();
        scene.add_child_node(
            AnnotationBuilder::default()
                .build("ghost")
                .with_position(Vec3::new(0.0, 0.0, 1.0)),
        );
        assert!(layout_annotations(&scene, &VirtualCamera::default(), viewport()).is_empty());
    }

    #[test]
    fn test_farther_labels_are_smaller_and_drawn_first() {
        let builder = AnnotationBuilder::default();
        let mut scene = Scene::new();
        scene.add_child_node(builder.build("near").with_position(Vec3::new(0.0, 0.0, -0.5)));
        scene.add_child_node(builder.build("far").with_position(Vec3::new(0.0, 0.0, -2.0)));

        let layouts = layout_annotations(&scene, &VirtualCamera::default(), viewport());
        assert_eq!(layouts[0].label, "far");
        assert_eq!(layouts[1].label, "near");
        assert!(layouts[0].font_size < layouts[1].font_size);
        assert!(layouts[0].font_size >= MIN_FONT_SIZE);
    }

    #[test]
    fn test_marker_radius_has_floor() {
        let mut scene = Scene::new();
        scene.add_child_node(
            AnnotationBuilder::default()
                .build("tiny")
                .with_position(Vec3::new(0.0, 0.0, -50.0)),
        );
        let layouts = layout_annotations(&scene, &VirtualCamera::default(), viewport());
        assert_eq!(layouts[0].marker_radius, MIN_MARKER_RADIUS);
    }
}
