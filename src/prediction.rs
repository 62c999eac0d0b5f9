//! Shared classification state
//!
//! `LatestPrediction` is written by the classifier loop and read on the main
//! thread when a tap places an annotation. `DiagnosticDisplay` holds the two
//! human-readable text fields shown in the diagnostic panel.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Label shown before any classification succeeds
pub const PLACEHOLDER_LABEL: &str = "…";

/// Separator between synonyms in classifier labels
pub const SYNONYM_DELIMITER: char = ',';

/// Most recent classification result
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// First synonym of the top label
    pub label: String,
    /// Confidence of the top label, `None` until a result arrives
    pub confidence: Option<f32>,
}

impl Default for Prediction {
    fn default() -> Self {
        Self {
            label: PLACEHOLDER_LABEL.to_string(),
            confidence: None,
        }
    }
}

/// Everything before the first comma of a classifier label
pub fn first_synonym(label: &str) -> &str {
    label.split(SYNONYM_DELIMITER).next().unwrap_or(label)
}

/// Cross-thread cell holding the latest prediction
#[derive(Debug, Clone, Default)]
pub struct LatestPrediction {
    inner: Arc<RwLock<Prediction>>,
}

impl LatestPrediction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new top label, keeping only its first synonym
    pub fn publish(&self, label: &str, confidence: f32) -> Prediction {
        let prediction = Prediction {
            label: first_synonym(label).to_string(),
            confidence: Some(confidence),
        };
        *self.inner.write() = prediction.clone();
        prediction
    }

    /// Snapshot of the current prediction
    pub fn get(&self) -> Prediction {
        self.inner.read().clone()
    }

    /// Current label only
    pub fn label(&self) -> String {
        self.inner.read().label.clone()
    }
}

#[derive(Debug, Default)]
struct DiagnosticText {
    object: String,
    confidence: String,
}

/// Object and confidence text fields for human observation
#[derive(Debug, Clone, Default)]
pub struct DiagnosticDisplay {
    inner: Arc<Mutex<DiagnosticText>>,
}

impl DiagnosticDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the full (untruncated) label and its confidence
    pub fn show_observation(&self, label: &str, confidence: f32) {
        let mut text = self.inner.lock();
        text.object = format!("Object: {}", label);
        text.confidence = format!("Confidence: {}", confidence);
    }

    pub fn object_text(&self) -> String {
        self.inner.lock().object.clone()
    }

    pub fn confidence_text(&self) -> String {
        self.inner.lock().confidence.clone()
    }

    /// Both fields read under one lock
    pub fn snapshot(&self) -> (String, String) {
        let text = self.inner.lock();
        (text.object.clone(), text.confidence.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_before_any_result() {
        let prediction = LatestPrediction::new();
        assert_eq!(prediction.label(), "…");
        assert_eq!(prediction.get().confidence, None);
    }

    #[test]
    fn test_first_synonym() {
        assert_eq!(first_synonym("dog,canine,puppy"), "dog");
        assert_eq!(first_synonym("tench, Tinca tinca"), "tench");
        assert_eq!(first_synonym("banana"), "banana");
        assert_eq!(first_synonym(",leading"), "");
        assert_eq!(first_synonym(""), "");
    }

    #[test]
    fn test_latest_result_wins() {
        let prediction = LatestPrediction::new();
        prediction.publish("cat,feline", 0.4);
        prediction.publish("dog,canine,puppy", 0.92);
        assert_eq!(prediction.get(), Prediction { label: "dog".to_string(), confidence: Some(0.92) });
    }

    #[test]
    fn test_clones_share_state() {
        let writer = LatestPrediction::new();
        let reader = writer.clone();
        writer.publish("mug", 0.7);
        assert_eq!(reader.label(), "mug");
    }

    #[test]
    fn test_diagnostic_text_keeps_full_label() {
        let display = DiagnosticDisplay::new();
        display.show_observation("dog,canine,puppy", 0.92);
        assert_eq!(display.object_text(), "Object: dog,canine,puppy");
        assert_eq!(display.confidence_text(), "Confidence: 0.92");
    }

    #[test]
    fn test_diagnostic_fields_start_empty() {
        let display = DiagnosticDisplay::new();
        assert_eq!(display.snapshot(), (String::new(), String::new()));
        display.clone().show_observation("mug", 0.5);
        assert_eq!(display.snapshot(), ("Object: mug".to_string(), "Confidence: 0.5".to_string()));
    }
}
