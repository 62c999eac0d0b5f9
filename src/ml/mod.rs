//! ML inference module
//!
//! Image classification behind the [`Classifier`] trait, an ONNX Runtime
//! implementation, and the background loop that keeps classifying the
//! latest camera frame.

pub mod classifier_loop;
pub mod onnx;
pub mod preprocess;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::camera::CameraFrame;

pub use classifier_loop::{ClassifierLoop, ClassifierWorker, IterationOutcome};
pub use onnx::OnnxClassifier;

/// A single (label, confidence) classification result
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Class label, possibly several comma-separated synonyms
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl Observation {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Highest-confidence observation in a result set
pub fn top_observation(observations: &[Observation]) -> Option<&Observation> {
    observations
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}

/// How a frame is fitted into the square model input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CropAndScale {
    /// Crop the largest centred square, then scale it
    #[default]
    CenterCrop,
    /// Scale the whole frame to fit, padding the short side
    ScaleFit,
    /// Stretch the whole frame to the input size
    ScaleFill,
}

/// Image classifier engine
pub trait Classifier: Send {
    /// Classify a frame, returning observations ranked by confidence
    fn classify(&mut self, frame: &CameraFrame) -> Result<Vec<Observation>, ClassifierError>;
}

/// Classifier errors
#[derive(Debug)]
pub enum ClassifierError {
    /// Model or labels file missing
    ModelNotFound(PathBuf),
    /// Labels file could not be read
    Labels(std::io::Error),
    /// ONNX Runtime failure (session creation or inference)
    Runtime(String),
    /// Frame could not be converted into a model input
    Preprocess(String),
    /// Model output does not match the label set
    OutputShape { expected: usize, actual: usize },
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::ModelNotFound(path) => write!(f, "Model file not found: {:?}", path),
            ClassifierError::Labels(e) => write!(f, "Failed to read labels: {}", e),
            ClassifierError::Runtime(e) => write!(f, "Inference runtime error: {}", e),
            ClassifierError::Preprocess(e) => write!(f, "Preprocessing failed: {}", e),
            ClassifierError::OutputShape { expected, actual } => write!(
                f,
                "Model produced {} scores but {} labels are loaded",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for ClassifierError {}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted classifier for tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    pub struct ScriptedClassifier {
        pub script: VecDeque<Result<Vec<Observation>, ClassifierError>>,
        pub calls: Arc<AtomicU64>,
    }

    impl ScriptedClassifier {
        pub fn new(script: Vec<Result<Vec<Observation>, ClassifierError>>) -> Self {
            Self {
                script: script.into(),
                calls: Arc::new(AtomicU64::new(0)),
            }
        }
    }

    impl Classifier for ScriptedClassifier {
        fn classify(&mut self, _frame: &CameraFrame) -> Result<Vec<Observation>, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }
}
