//! Continuous classification loop
//!
//! A single background thread repeatedly takes the latest camera frame,
//! classifies it and publishes the top label. Iterations never overlap and
//! failures only skip the current iteration.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::{top_observation, Classifier};
use crate::ar::FrameSource;
use crate::prediction::{DiagnosticDisplay, LatestPrediction, Prediction};

/// Result of one loop iteration
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// No camera frame available yet
    NoFrame,
    /// No classifier loaded; frames are polled but never classified
    Inert,
    /// The classifier returned an empty result set
    NoResults,
    /// The classifier returned an error
    Failed,
    /// A new prediction was published
    Published(Prediction),
}

impl IterationOutcome {
    /// Whether the iteration published nothing and the loop should back off briefly
    fn is_idle(&self) -> bool {
        !matches!(self, Self::Published(_))
    }
}

/// State owned by the loop thread
pub struct ClassifierWorker {
    source: Arc<dyn FrameSource>,
    classifier: Option<Box<dyn Classifier>>,
    prediction: LatestPrediction,
    diagnostics: DiagnosticDisplay,
}

impl ClassifierWorker {
    /// `classifier` is `None` when the model failed to load
    pub fn new(
        source: Arc<dyn FrameSource>,
        classifier: Option<Box<dyn Classifier>>,
        prediction: LatestPrediction,
        diagnostics: DiagnosticDisplay,
    ) -> Self {
        Self {
            source,
            classifier,
            prediction,
            diagnostics,
        }
    }

    /// Run one fetch-classify-publish step
    pub fn run_iteration(&mut self) -> IterationOutcome {
        let Some(frame) = self.source.current_frame() else {
            log::trace!("No camera frame available");
            return IterationOutcome::NoFrame;
        };

        let Some(classifier) = self.classifier.as_mut() else {
            return IterationOutcome::Inert;
        };

        let observations = match classifier.classify(&frame) {
            Ok(observations) => observations,
            Err(e) => {
                log::warn!("Classification error: {}", e);
                return IterationOutcome::Failed;
            }
        };

        let Some(top) = top_observation(&observations) else {
            log::debug!("No results for frame {}", frame.frame_number);
            return IterationOutcome::NoResults;
        };

        log::debug!(
            "Classified frame {}: {} ({})",
            frame.frame_number,
            top.label,
            top.confidence
        );

        self.diagnostics.show_observation(&top.label, top.confidence);
        let prediction = self.prediction.publish(&top.label, top.confidence);
        IterationOutcome::Published(prediction)
    }
}

/// Handle to the running classifier thread
pub struct ClassifierLoop {
    /// Set to request the thread to exit
    stop: Arc<AtomicBool>,
    /// Completed iterations
    iterations: Arc<AtomicU64>,
    /// Loop thread handle
    thread_handle: Option<JoinHandle<()>>,
}

impl ClassifierLoop {
    /// Spawn the loop thread.
    ///
    /// `idle_delay` is slept after every iteration that published nothing,
    /// so an absent camera, a missing model or an empty result set does not
    /// spin a core.
    pub fn spawn(worker: ClassifierWorker, idle_delay: Duration) -> Result<Self, String> {
        let stop = Arc::new(AtomicBool::new(false));
        let iterations = Arc::new(AtomicU64::new(0));

        let stop_clone = stop.clone();
        let iterations_clone = iterations.clone();

        let thread_handle = std::thread::Builder::new()
            .name("classifier-loop".to_string())
            .spawn(move || {
                Self::loop_thread(worker, stop_clone, iterations_clone, idle_delay);
            })
            .map_err(|e| format!("Failed to spawn classifier thread: {}", e))?;

        Ok(Self {
            stop,
            iterations,
            thread_handle: Some(thread_handle),
        })
    }

    /// Loop thread main loop
    fn loop_thread(
        mut worker: ClassifierWorker,
        stop: Arc<AtomicBool>,
        iterations: Arc<AtomicU64>,
        idle_delay: Duration,
    ) {
        if worker.classifier.is_none() {
            log::warn!("Classifier loop started without a model; predictions will not update");
        } else {
            log::info!("Classifier loop started");
        }

        while !stop.load(Ordering::Acquire) {
            let outcome = worker.run_iteration();
            iterations.fetch_add(1, Ordering::Release);

            if outcome.is_idle() && !idle_delay.is_zero() {
                std::thread::sleep(idle_delay);
            }
        }

        log::info!("Classifier loop stopped");
    }

    /// Number of completed iterations
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Acquire)
    }

    /// Whether the loop thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the loop and wait for the current iteration to finish
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Classifier loop thread panicked");
            }
        }
    }
}

impl Drop for ClassifierLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ar::mock::MockFrameSource;
    use crate::ml::mock::ScriptedClassifier;
    use crate::ml::{ClassifierError, Observation};
    use crate::prediction::PLACEHOLDER_LABEL;
    use std::time::Instant;

    fn worker(source: MockFrameSource, classifier: Option<ScriptedClassifier>) -> ClassifierWorker {
        ClassifierWorker::new(
            Arc::new(source),
            classifier.map(|c| Box::new(c) as Box<dyn Classifier>),
            LatestPrediction::new(),
            DiagnosticDisplay::new(),
        )
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_publishes_first_synonym_and_full_diagnostics() {
        let classifier = ScriptedClassifier::new(vec![Ok(vec![
            Observation::new("dog,canine,puppy", 0.92),
            Observation::new("wolf", 0.05),
        ])]);
        let mut worker = worker(MockFrameSource::with_frame(), Some(classifier));

        let outcome = worker.run_iteration();
        assert_eq!(
            outcome,
            IterationOutcome::Published(Prediction {
                label: "dog".to_string(),
                confidence: Some(0.92)
            })
        );
        assert_eq!(worker.prediction.label(), "dog");
        assert_eq!(worker.diagnostics.object_text(), "Object: dog,canine,puppy");
        assert_eq!(worker.diagnostics.confidence_text(), "Confidence: 0.92");
    }

    #[test]
    fn test_prediction_tracks_latest_non_empty_result() {
        let classifier = ScriptedClassifier::new(vec![
            Ok(vec![Observation::new("cat,feline", 0.6)]),
            Err(ClassifierError::Runtime("boom".to_string())),
            Ok(Vec::new()),
            Ok(vec![Observation::new("mug", 0.3), Observation::new("cup,teacup", 0.5)]),
            Ok(Vec::new()),
        ]);
        let mut worker = worker(MockFrameSource::with_frame(), Some(classifier));

        let expected = ["cat", "cat", "cat", "cup", "cup"];
        let outcomes: Vec<_> = expected
            .iter()
            .map(|label| {
                let outcome = worker.run_iteration();
                assert_eq!(worker.prediction.label(), *label);
                outcome
            })
            .collect();

        assert!(matches!(outcomes[1], IterationOutcome::Failed));
        assert!(matches!(outcomes[2], IterationOutcome::NoResults));
        assert_eq!(worker.prediction.get().confidence, Some(0.5));
    }

    #[test]
    fn test_placeholder_until_success() {
        let classifier = ScriptedClassifier::new(vec![Err(ClassifierError::Runtime("x".to_string()))]);
        let mut worker = worker(MockFrameSource::with_frame(), Some(classifier));
        worker.run_iteration();
        assert_eq!(worker.prediction.label(), PLACEHOLDER_LABEL);
        assert_eq!(worker.diagnostics.object_text(), "");
    }

    #[test]
    fn test_no_frame_skips_classifier() {
        let classifier = ScriptedClassifier::new(vec![Ok(vec![Observation::new("dog", 1.0)])]);
        let calls = classifier.calls.clone();
        let mut worker = worker(MockFrameSource::new(), Some(classifier));

        assert_eq!(worker.run_iteration(), IterationOutcome::NoFrame);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(worker.prediction.label(), PLACEHOLDER_LABEL);
    }

    #[test]
    fn test_inert_without_classifier() {
        let mut worker = worker(MockFrameSource::with_frame(), None);
        assert_eq!(worker.run_iteration(), IterationOutcome::Inert);
        assert_eq!(worker.prediction.label(), PLACEHOLDER_LABEL);
    }

    #[test]
    fn test_only_published_iterations_skip_idle_delay() {
        assert!(IterationOutcome::NoFrame.is_idle());
        assert!(IterationOutcome::Inert.is_idle());
        assert!(IterationOutcome::Failed.is_idle());
        assert!(IterationOutcome::NoResults.is_idle());
        assert!(!IterationOutcome::Published(Prediction::default()).is_idle());
    }

    #[test]
    fn test_empty_results_back_off() {
        let classifier = ScriptedClassifier::new(Vec::new());
        let calls = classifier.calls.clone();
        let mut classifier_loop = ClassifierLoop::spawn(
            worker(MockFrameSource::with_frame(), Some(classifier)),
            Duration::from_millis(20),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(200));
        classifier_loop.stop();

        // Each empty result waits the idle delay, so at most ~10 calls fit
        let made = calls.load(Ordering::SeqCst);
        assert!(made >= 1);
        assert!(made <= 20, "classifier called {} times", made);
    }

    #[test]
    fn test_loop_survives_missing_frames() {
        let classifier = ScriptedClassifier::new(Vec::new());
        let mut classifier_loop = ClassifierLoop::spawn(
            worker(MockFrameSource::new(), Some(classifier)),
            Duration::from_millis(1),
        )
        .unwrap();

        assert!(wait_for(|| classifier_loop.iterations() >= 50));
        assert!(classifier_loop.is_running());

        classifier_loop.stop();
        assert!(!classifier_loop.is_running());
    }

    #[test]
    fn test_loop_publishes_in_background() {
        let source = Arc::new(MockFrameSource::with_frame());
        let prediction = LatestPrediction::new();
        let diagnostics = DiagnosticDisplay::new();
        let classifier = ScriptedClassifier::new(vec![Ok(vec![Observation::new("banana", 0.8)])]);

        let worker = ClassifierWorker::new(
            source,
            Some(Box::new(classifier)),
            prediction.clone(),
            diagnostics.clone(),
        );
        let _classifier_loop = ClassifierLoop::spawn(worker, Duration::from_millis(1)).unwrap();

        assert!(wait_for(|| prediction.label() == "banana"));
        assert_eq!(diagnostics.confidence_text(), "Confidence: 0.8");
    }
}
