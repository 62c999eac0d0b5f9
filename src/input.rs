//! Tap handling
//!
//! A tap anywhere places an annotation for the current prediction at the
//! feature point under the centre of the view. The tap location itself is
//! ignored.

use glam::{Vec2, Vec3};

use crate::ar::HitTestType;
use crate::context::AppContext;

/// Place an annotation at the feature point under the view centre.
///
/// Returns the world position of the new annotation, or `None` when the hit
/// test found nothing and the scene was left unchanged.
pub fn handle_tap(ctx: &mut AppContext, tap: Vec2) -> Option<Vec3> {
    let center = ctx.viewport.center();
    log::trace!("Tap at {:?}, hit-testing view centre {:?}", tap, center);

    let results = ctx
        .frame_source
        .hit_test(center, ctx.viewport, &[HitTestType::FeaturePoint]);

    let Some(closest) = results.first() else {
        log::debug!("Tap ignored: no feature point under the view centre");
        return None;
    };

    let position = closest.translation();
    let label = ctx.prediction.label();
    let node = ctx.annotations.build(&label).with_position(position);
    ctx.scene.add_child_node(node);

    log::info!("Placed annotation '{}' at {:?}", label, position);
    Some(position)
}
