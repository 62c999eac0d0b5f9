//! AR Smart Camera - live classification labels anchored in 3D
//!
//! A background loop classifies the latest webcam frame with an ONNX model.
//! Tapping the view places the current label at the feature point under the
//! view centre, drawn as billboarded text over a small sphere marker.

pub mod app;
pub mod ar;
pub mod camera;
pub mod config;
pub mod context;
pub mod input;
pub mod logging;
pub mod ml;
pub mod prediction;
pub mod render;
pub mod scene;

pub use app::App;
pub use context::AppContext;
