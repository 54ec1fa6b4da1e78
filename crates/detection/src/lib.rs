//! Language detection
//!
//! A fast fastText classifier screens every request; a lingua detector is
//! consulted when the fast confidence is too low. Both label vocabularies are
//! reconciled onto FLORES-200 codes.

pub mod classifier;
pub mod ensemble;
pub mod stub;

#[cfg(feature = "fasttext")]
pub mod fasttext;
#[cfg(feature = "lingua")]
pub mod lingua;

pub use classifier::{AccurateClassifier, FastClassifier};
pub use ensemble::{LanguageDetector, Thresholds};
pub use stub::{ScriptedAccurate, ScriptedFast, StubClassifier};

#[cfg(feature = "fasttext")]
pub use crate::fasttext::FastTextClassifier;
#[cfg(feature = "lingua")]
pub use crate::lingua::LinguaClassifier;

use nllb_config::DetectorConfig;
use nllb_core::Result;

/// Build the detector described by `config`
pub fn create_detector(config: &DetectorConfig) -> Result<LanguageDetector> {
    if config.stub {
        tracing::warn!("Using stub language classifier");
        return Ok(LanguageDetector::new(Box::new(StubClassifier), None, config));
    }

    let fast = create_fast(config)?;
    let accurate = if config.accurate_enabled {
        create_accurate()?
    } else {
        None
    };

    if accurate.is_none() {
        tracing::warn!("Accurate language classifier disabled; using fast results only");
    }
    Ok(LanguageDetector::new(fast, accurate, config))
}

#[cfg(feature = "fasttext")]
fn create_fast(config: &DetectorConfig) -> Result<Box<dyn FastClassifier>> {
    Ok(Box::new(FastTextClassifier::load(&config.fasttext_model_path)?))
}

#[cfg(not(feature = "fasttext"))]
fn create_fast(_config: &DetectorConfig) -> Result<Box<dyn FastClassifier>> {
    Err(nllb_core::Error::Config(
        "built without the `fasttext` feature; enable it or set detector.stub".to_string(),
    ))
}

#[cfg(feature = "lingua")]
fn create_accurate() -> Result<Option<Box<dyn AccurateClassifier>>> {
    Ok(Some(Box::new(LinguaClassifier::new())))
}

#[cfg(not(feature = "lingua"))]
fn create_accurate() -> Result<Option<Box<dyn AccurateClassifier>>> {
    Ok(None)
}
