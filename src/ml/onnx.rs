//! ONNX Runtime image classifier
//!
//! Loads a ResNet-50 style model (1x3xNxN input, one score per class) and a
//! newline-separated labels file from the models directory.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array4;

use super::preprocess::{self, IMAGENET_MEAN, IMAGENET_STD};
use super::{Classifier, ClassifierError, CropAndScale, Observation};
use crate::camera::CameraFrame;
use crate::config::ClassifierConfig;

/// Image classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    session: ort::session::Session,
    labels: Vec<String>,
    input_size: u32,
    crop_and_scale: CropAndScale,
}

impl OnnxClassifier {
    /// Initialize ONNX Runtime and load the configured model and labels
    pub fn load(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let model_path = resolve_model_file(&config.model)?;
        let labels_path = resolve_model_file(&config.labels)?;
        log::info!("Classifier model: {:?}", model_path);

        let labels = load_labels(&labels_path)?;
        log::info!("Loaded {} labels from {:?}", labels.len(), labels_path);

        ort::init()
            .with_name("ArSmartCamera")
            .commit()
            .map_err(|e| ClassifierError::Runtime(format!("Failed to initialize ORT: {}", e)))?;

        let session = ort::session::Session::builder()
            .map_err(|e| ClassifierError::Runtime(format!("Failed to create session builder: {}", e)))?
            .with_intra_threads(config.intra_threads.max(1))
            .map_err(|e| ClassifierError::Runtime(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| ClassifierError::Runtime(format!("Failed to load model: {}", e)))?;

        log::info!("Loaded classification model from {:?}", model_path);

        Ok(Self {
            session,
            labels,
            input_size: config.input_size,
            crop_and_scale: config.crop_and_scale,
        })
    }

    /// Number of classes the classifier can report
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, frame: &CameraFrame) -> Result<Vec<Observation>, ClassifierError> {
        let size = self.input_size;
        let fitted = preprocess::fit_to_input(frame, size, self.crop_and_scale)?;
        let input = preprocess::to_chw_normalized(&fitted, IMAGENET_MEAN, IMAGENET_STD);

        let input_array = Array4::from_shape_vec((1, 3, size as usize, size as usize), input)
            .map_err(|e| ClassifierError::Preprocess(format!("Failed to create input array: {}", e)))?;

        let input_tensor = ort::value::Tensor::from_array(input_array)
            .map_err(|e| ClassifierError::Runtime(format!("Failed to create tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ClassifierError::Runtime(format!("Inference failed: {}", e)))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| ClassifierError::Runtime("No output from classification model".to_string()))?;

        let (_shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Runtime(format!("Failed to extract output: {}", e)))?;

        rank_scores(data, &self.labels)
    }
}

/// Pair scores with labels, normalize to probabilities and sort descending
pub fn rank_scores(scores: &[f32], labels: &[String]) -> Result<Vec<Observation>, ClassifierError> {
    if scores.len() != labels.len() {
        return Err(ClassifierError::OutputShape {
            expected: labels.len(),
            actual: scores.len(),
        });
    }

    let probabilities = if preprocess::is_probability_distribution(scores) {
        scores.to_vec()
    } else {
        preprocess::softmax(scores)
    };

    let mut observations: Vec<Observation> = labels
        .iter()
        .zip(probabilities)
        .map(|(label, confidence)| Observation::new(label.clone(), confidence))
        .collect();
    observations.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(observations)
}

/// Parse a labels file: one label per line, blank lines skipped.
///
/// Lines in ImageNet synset form (`n01440764 tench, Tinca tinca`) lose the
/// leading WordNet id.
pub fn parse_labels(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(' ') {
            Some((id, rest)) if is_synset_id(id) => rest.trim().to_string(),
            _ => line.to_string(),
        })
        .collect()
}

fn is_synset_id(token: &str) -> bool {
    token.len() == 9 && token.starts_with('n') && token[1..].chars().all(|c| c.is_ascii_digit())
}

fn load_labels(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let contents = fs::read_to_string(path).map_err(ClassifierError::Labels)?;
    Ok(parse_labels(&contents))
}

/// Resolve a model file: absolute or existing paths are used as-is,
/// otherwise the file is looked up in the models directory.
fn resolve_model_file(path: &Path) -> Result<PathBuf, ClassifierError> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if path.is_absolute() {
        return Err(ClassifierError::ModelNotFound(path.to_path_buf()));
    }

    let model_dir = find_model_dir().ok_or_else(|| ClassifierError::ModelNotFound(path.to_path_buf()))?;
    let candidate = model_dir.join(path);
    if candidate.exists() {
        Ok(candidate)
    } else {
        Err(ClassifierError::ModelNotFound(candidate))
    }
}

/// Find the models directory next to the executable, in its ancestors, or in the working directory
fn find_model_dir() -> Option<PathBuf> {
    if let Ok(exe_path) = std::env::current_exe() {
        // Covers target/{debug,release} and installed layouts
        for dir in exe_path.ancestors().skip(1).take(3) {
            let model_dir = dir.join("models");
            if model_dir.is_dir() {
                return Some(model_dir);
            }
        }
    }

    let model_dir = std::env::current_dir().ok()?.join("models");
    model_dir.is_dir().then_some(model_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_plain_labels() {
        let parsed = parse_labels("tench, Tinca tinca\n\ngoldfish, Carassius auratus\n");
        assert_eq!(parsed, labels(&["tench, Tinca tinca", "goldfish, Carassius auratus"]));
    }

    #[test]
    fn test_parse_synset_labels() {
        let parsed = parse_labels("n01440764 tench, Tinca tinca\nn01443537 goldfish\n");
        assert_eq!(parsed, labels(&["tench, Tinca tinca", "goldfish"]));
    }

    #[test]
    fn test_parse_keeps_ordinary_words() {
        let parsed = parse_labels("night light\n");
        assert_eq!(parsed, labels(&["night light"]));
    }

    #[test]
    fn test_rank_scores_softmaxes_logits() {
        let ranked = rank_scores(&[1.0, 5.0, 2.0], &labels(&["a", "b", "c"])).unwrap();
        assert_eq!(ranked[0].label, "b");
        assert_eq!(ranked[2].label, "a");
        let total: f32 = ranked.iter().map(|o| o.confidence).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rank_scores_keeps_probabilities() {
        let ranked = rank_scores(&[0.1, 0.9], &labels(&["cat", "dog,canine"])).unwrap();
        assert_eq!(ranked[0], Observation::new("dog,canine", 0.9));
    }

    #[test]
    fn test_rank_scores_shape_mismatch() {
        let result = rank_scores(&[0.5, 0.5], &labels(&["only"]));
        assert!(matches!(
            result,
            Err(ClassifierError::OutputShape { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_missing_model_reported() {
        let config = ClassifierConfig {
            model: PathBuf::from("/nonexistent/model.onnx"),
            ..ClassifierConfig::default()
        };
        assert!(matches!(
            OnnxClassifier::load(&config),
            Err(ClassifierError::ModelNotFound(_))
        ));
    }
}
