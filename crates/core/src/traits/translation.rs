//! Translation engine traits
//!
//! An engine is one loaded model plus its tokenizer. Engines are stateful and
//! are never shared between two in-flight translations: every method that runs
//! inference takes `&mut self`, and the pool hands out exclusive leases.

use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::{LanguageCode, Result};

/// Where an engine's weights currently live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Accelerator,
}

/// Receives streamed text fragments in generation order.
///
/// Returning `ControlFlow::Break` tells the engine the consumer is gone and
/// generation should stop at the next token boundary.
pub type TokenSink<'a> = &'a mut dyn FnMut(String) -> ControlFlow<()>;

/// Counts the tokens a text would occupy in the translator input
pub trait TokenCounter: Send + Sync {
    /// Token count including the injected language-tag token
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

/// A single translation engine (model + tokenizer)
///
/// # Example
///
/// ```ignore
/// let mut engine = StubEngine::new();
/// let text = engine.translate("Hello", LanguageCode::EngLatn, LanguageCode::SpaLatn)?;
/// ```
pub trait TranslationEngine: Send + 'static {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Device the weights are loaded on
    fn device(&self) -> Device;

    /// Whether weights are resident and translation is possible
    fn is_loaded(&self) -> bool;

    /// Translate `text` and return the completed output
    fn translate(&mut self, text: &str, source: LanguageCode, target: LanguageCode)
        -> Result<String>;

    /// Translate `text`, handing each decoded fragment to `sink` as soon as it
    /// is produced
    fn translate_stream(
        &mut self,
        text: &str,
        source: LanguageCode,
        target: LanguageCode,
        sink: TokenSink<'_>,
    ) -> Result<()>;

    /// Release device memory. Returns `false` if the model was already unloaded.
    fn unload_model(&mut self, to_cpu: bool) -> Result<bool>;

    /// Load weights back onto the device. Returns `false` if already loaded.
    fn load_model(&mut self, keep_cache: bool) -> Result<bool>;

    /// Shared token counter; usable without holding the engine
    fn token_counter(&self) -> Arc<dyn TokenCounter>;
}

/// A detected language with the confidence of the classifier that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub language: LanguageCode,
    pub confidence: f64,
}

impl Prediction {
    /// Build a prediction, clamping the confidence into `[0, 1]`
    pub fn new(language: LanguageCode, confidence: f64) -> Self {
        Self {
            language,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_clamps_confidence() {
        assert_eq!(Prediction::new(LanguageCode::EngLatn, 1.00003).confidence, 1.0);
        assert_eq!(Prediction::new(LanguageCode::EngLatn, -0.2).confidence, 0.0);
        assert_eq!(Prediction::new(LanguageCode::EngLatn, 0.42).confidence, 0.42);
    }

    #[test]
    fn test_device_serde() {
        assert_eq!(serde_json::to_string(&Device::Accelerator).unwrap(), "\"accelerator\"");
    }
}
