//! fastText language identification (fast stage)

use std::path::Path;

use ::fasttext::FastText;
use nllb_core::{Error, Result};
use parking_lot::Mutex;

use crate::classifier::FastClassifier;

/// Wraps a fastText model. The bindings make no thread-safety promise for
/// `predict`, so calls are serialized.
pub struct FastTextClassifier {
    model: Mutex<FastText>,
}

impl FastTextClassifier {
    pub fn load(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::Config(format!("Non UTF-8 model path: {}", path.display())))?;

        if !path.is_file() {
            return Err(Error::Model(format!("fastText model not found: {}", path.display())));
        }

        let mut model = FastText::new();
        model
            .load_model(path_str)
            .map_err(|e| Error::Model(format!("Failed to load fastText model {}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), "Loaded fastText classifier");
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl FastClassifier for FastTextClassifier {
    fn predict(&self, text: &str, k: usize) -> Result<Vec<(String, f64)>> {
        let k = i32::try_from(k).unwrap_or(i32::MAX);
        let predictions = self
            .model
            .lock()
            .predict(text, k, 0.0)
            .map_err(|e| Error::Detection(format!("fastText prediction failed: {e}")))?;

        Ok(predictions
            .into_iter()
            .map(|prediction| (prediction.label, f64::from(prediction.prob)))
            .collect())
    }
}
