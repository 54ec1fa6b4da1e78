//! Stand-in classifiers for dry runs and tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nllb_core::{Prediction, Result};

use crate::classifier::{AccurateClassifier, FastClassifier};

/// Calls everything English with full confidence
#[derive(Debug, Default, Clone, Copy)]
pub struct StubClassifier;

impl FastClassifier for StubClassifier {
    fn predict(&self, _text: &str, _k: usize) -> Result<Vec<(String, f64)>> {
        Ok(vec![("__label__eng_Latn".to_string(), 1.0)])
    }
}

/// Fast classifier returning a fixed candidate list
#[derive(Debug, Clone)]
pub struct ScriptedFast {
    candidates: Vec<(String, f64)>,
}

impl ScriptedFast {
    pub fn new<S: Into<String>>(candidates: Vec<(S, f64)>) -> Self {
        Self {
            candidates: candidates
                .into_iter()
                .map(|(label, probability)| (label.into(), probability))
                .collect(),
        }
    }
}

impl FastClassifier for ScriptedFast {
    fn predict(&self, _text: &str, k: usize) -> Result<Vec<(String, f64)>> {
        Ok(self.candidates.iter().take(k).cloned().collect())
    }
}

/// Accurate classifier returning a fixed answer and counting calls
#[derive(Debug)]
pub struct ScriptedAccurate {
    answer: Option<Prediction>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAccurate {
    pub fn new(answer: Option<Prediction>) -> Self {
        Self {
            answer,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl AccurateClassifier for ScriptedAccurate {
    fn classify(&self, _text: &str) -> Result<Option<Prediction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}
