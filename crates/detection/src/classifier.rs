//! Classifier seams for the detection ensemble

use nllb_core::{Prediction, Result};

/// Broad-coverage classifier run on every request
///
/// Labels are raw model labels (`__label__eng_Latn`); the ensemble decides
/// which of them name a supported language.
pub trait FastClassifier: Send + Sync {
    /// Top `k` labels with their probabilities, most likely first
    fn predict(&self, text: &str, k: usize) -> Result<Vec<(String, f64)>>;
}

/// Slower, higher-precision classifier consulted on low fast confidence
pub trait AccurateClassifier: Send + Sync {
    /// Most likely language, or `None` when the classifier's best guess has
    /// no supported equivalent
    fn classify(&self, text: &str) -> Result<Option<Prediction>>;
}
