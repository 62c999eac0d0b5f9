//! Application context
//!
//! Everything the tap handler and the renderer need, owned in one place on
//! the main thread. The classifier loop only shares the frame source and the
//! prediction cells.

use std::sync::Arc;

use crate::ar::{FrameSource, Viewport};
use crate::prediction::{DiagnosticDisplay, LatestPrediction};
use crate::scene::{AnnotationBuilder, Scene};

pub struct AppContext {
    /// AR session providing frames and hit tests
    pub frame_source: Arc<dyn FrameSource>,
    /// Latest prediction published by the classifier loop
    pub prediction: LatestPrediction,
    /// Diagnostic text fields
    pub diagnostics: DiagnosticDisplay,
    /// Rendered scene; only mutated on the main thread
    pub scene: Scene,
    /// Current view size in logical points
    pub viewport: Viewport,
    /// Annotation node factory
    pub annotations: AnnotationBuilder,
}

impl AppContext {
    pub fn new(frame_source: Arc<dyn FrameSource>, viewport: Viewport, annotations: AnnotationBuilder) -> Self {
        Self {
            frame_source,
            prediction: LatestPrediction::new(),
            diagnostics: DiagnosticDisplay::new(),
            scene: Scene::new(),
            viewport,
            annotations,
        }
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Viewport::new(width, height);
    }
}
