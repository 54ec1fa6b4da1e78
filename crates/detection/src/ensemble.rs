//! Two-stage language detection
//!
//! The fast classifier answers when it is confident enough. Otherwise the
//! accurate classifier gets a say, and its answer replaces the fast one only
//! if it maps to a supported language with more than the accurate threshold.

use std::sync::Arc;

use nllb_config::DetectorConfig;
use nllb_core::{Error, LanguageCode, Prediction, Result};

use crate::classifier::{AccurateClassifier, FastClassifier};

const LABEL_PREFIX: &str = "__label__";

/// Confidence cutoffs for one detection request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Fast confidence at or above which the accurate stage is skipped
    pub fast: f64,
    /// Accurate confidence that must be exceeded to override the fast result
    pub accurate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from(&DetectorConfig::default())
    }
}

impl From<&DetectorConfig> for Thresholds {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            fast: config.fast_threshold,
            accurate: config.accurate_threshold,
        }
    }
}

struct DetectorInner {
    fast: Box<dyn FastClassifier>,
    accurate: Option<Box<dyn AccurateClassifier>>,
    max_text_chars: usize,
    top_k: usize,
    defaults: Thresholds,
}

/// Shared handle to the detection ensemble
#[derive(Clone)]
pub struct LanguageDetector {
    inner: Arc<DetectorInner>,
}

impl LanguageDetector {
    pub fn new(
        fast: Box<dyn FastClassifier>,
        accurate: Option<Box<dyn AccurateClassifier>>,
        config: &DetectorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(DetectorInner {
                fast,
                accurate,
                max_text_chars: config.max_text_chars,
                top_k: config.top_k.max(1),
                defaults: Thresholds::from(config),
            }),
        }
    }

    /// Thresholds used when a request leaves them out
    pub fn default_thresholds(&self) -> Thresholds {
        self.inner.defaults
    }

    pub fn has_accurate_stage(&self) -> bool {
        self.inner.accurate.is_some()
    }

    /// Detect on the blocking pool
    pub async fn detect(&self, text: String, thresholds: Thresholds) -> Result<Prediction> {
        let detector = self.clone();
        tokio::task::spawn_blocking(move || detector.detect_blocking(&text, thresholds))
            .await
            .map_err(|e| Error::Detection(format!("Detection task failed: {e}")))?
    }

    pub fn detect_blocking(&self, text: &str, thresholds: Thresholds) -> Result<Prediction> {
        self.validate(text, thresholds)?;

        let fast = self.fast_stage(text)?;
        if let Some(prediction) = fast {
            if prediction.confidence >= thresholds.fast {
                tracing::debug!(
                    language = %prediction.language,
                    confidence = prediction.confidence,
                    "Fast classifier is confident"
                );
                return Ok(prediction);
            }
        }

        if let Some(accurate) = self.accurate_stage(text)? {
            if accurate.confidence > thresholds.accurate {
                tracing::debug!(
                    language = %accurate.language,
                    confidence = accurate.confidence,
                    "Escalated to accurate classifier"
                );
                return Ok(accurate);
            }
        }

        fast.ok_or_else(|| {
            Error::Detection("no classifier produced a supported language".to_string())
        })
    }

    fn validate(&self, text: &str, thresholds: Thresholds) -> Result<()> {
        if text.is_empty() {
            return Err(Error::InvalidInput("text must not be empty".to_string()));
        }
        if text.contains('\n') {
            return Err(Error::InvalidInput(
                "text must be a single line".to_string(),
            ));
        }
        let chars = text.chars().count();
        if chars > self.inner.max_text_chars {
            return Err(Error::InvalidInput(format!(
                "text is {chars} characters, the limit is {}",
                self.inner.max_text_chars
            )));
        }
        if !thresholds.fast.is_finite() || !thresholds.accurate.is_finite() {
            return Err(Error::InvalidInput(
                "confidence thresholds must be finite numbers".to_string(),
            ));
        }
        Ok(())
    }

    /// First supported label among the fast classifier's top candidates
    fn fast_stage(&self, text: &str) -> Result<Option<Prediction>> {
        let candidates = self.inner.fast.predict(text, self.inner.top_k)?;

        Ok(candidates.into_iter().find_map(|(label, probability)| {
            let code = label.strip_prefix(LABEL_PREFIX).unwrap_or(&label);
            code.parse::<LanguageCode>()
                .ok()
                .map(|language| Prediction::new(language, probability))
        }))
    }

    fn accurate_stage(&self, text: &str) -> Result<Option<Prediction>> {
        match &self.inner.accurate {
            Some(classifier) => classifier.classify(text),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{ScriptedAccurate, ScriptedFast};

    fn detector(fast: Vec<(&str, f64)>, accurate: Option<Option<Prediction>>) -> LanguageDetector {
        LanguageDetector::new(
            Box::new(ScriptedFast::new(fast)),
            accurate.map(|answer| Box::new(ScriptedAccurate::new(answer)) as Box<dyn AccurateClassifier>),
            &DetectorConfig::default(),
        )
    }

    fn thresholds(fast: f64, accurate: f64) -> Thresholds {
        Thresholds { fast, accurate }
    }

    #[test]
    fn test_confident_fast_result_skips_accurate_stage() {
        let accurate = ScriptedAccurate::new(Some(Prediction::new(LanguageCode::DeuLatn, 0.99)));
        let calls = accurate.calls();
        let detector = LanguageDetector::new(
            Box::new(ScriptedFast::new(vec![("__label__fra_Latn", 0.97)])),
            Some(Box::new(accurate)),
            &DetectorConfig::default(),
        );

        let prediction = detector.detect_blocking("Bonjour", thresholds(0.85, 0.35)).unwrap();
        assert_eq!(prediction.language, LanguageCode::FraLatn);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_low_fast_confidence_escalates() {
        let detector = detector(
            vec![("__label__fra_Latn", 0.4)],
            Some(Some(Prediction::new(LanguageCode::CatLatn, 0.7))),
        );
        let prediction = detector.detect_blocking("Bon dia", thresholds(0.85, 0.35)).unwrap();
        assert_eq!(prediction, Prediction::new(LanguageCode::CatLatn, 0.7));
    }

    #[test]
    fn test_unreachable_fast_threshold_always_escalates() {
        let detector = detector(
            vec![("__label__eng_Latn", 1.0)],
            Some(Some(Prediction::new(LanguageCode::SpaLatn, 0.01))),
        );
        let prediction = detector.detect_blocking("Hola", thresholds(1.1, 0.0)).unwrap();
        assert_eq!(prediction.language, LanguageCode::SpaLatn);
    }

    #[test]
    fn test_weak_accurate_result_falls_back_to_fast() {
        let detector = detector(
            vec![("__label__ita_Latn", 0.5)],
            Some(Some(Prediction::new(LanguageCode::SpaLatn, 0.35))),
        );
        let prediction = detector.detect_blocking("Ciao", thresholds(0.85, 0.35)).unwrap();
        assert_eq!(prediction, Prediction::new(LanguageCode::ItaLatn, 0.5));
    }

    #[test]
    fn test_unmapped_accurate_result_falls_back_to_fast() {
        let detector = detector(vec![("__label__ita_Latn", 0.5)], Some(None));
        let prediction = detector.detect_blocking("Lorem ipsum", thresholds(0.85, 0.0)).unwrap();
        assert_eq!(prediction.language, LanguageCode::ItaLatn);
    }

    #[test]
    fn test_noise_labels_are_skipped() {
        let detector = detector(
            vec![("__label__zxx_Zxxx", 0.6), ("__label__nld_Latn", 0.3)],
            None,
        );
        let prediction = detector.detect_blocking("Hallo", thresholds(0.85, 0.35)).unwrap();
        assert_eq!(prediction.language, LanguageCode::NldLatn);
    }

    #[test]
    fn test_no_supported_language_is_an_error() {
        let detector = detector(vec![("__label__zxx_Zxxx", 0.9)], Some(None));
        assert!(matches!(
            detector.detect_blocking("???", thresholds(0.85, 0.35)),
            Err(Error::Detection(_))
        ));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let detector = detector(vec![("__label__eng_Latn", 1.00002)], None);
        let prediction = detector.detect_blocking("Hello", thresholds(0.85, 0.35)).unwrap();
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }

    #[test]
    fn test_invalid_input() {
        let detector = detector(vec![("__label__eng_Latn", 1.0)], None);
        let default = Thresholds::default();

        for text in ["", "two\nlines"] {
            assert!(matches!(
                detector.detect_blocking(text, default),
                Err(Error::InvalidInput(_))
            ));
        }
        assert!(matches!(
            detector.detect_blocking(&"a".repeat(513), default),
            Err(Error::InvalidInput(_))
        ));
        assert!(detector.detect_blocking(&"a".repeat(512), default).is_ok());
        assert!(matches!(
            detector.detect_blocking("Hello", thresholds(f64::NAN, 0.35)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_async_detect() {
        let detector = detector(vec![("__label__por_Latn", 0.92)], None);
        let prediction = detector
            .detect("Olá".to_string(), Thresholds::default())
            .await
            .unwrap();
        assert_eq!(prediction.language, LanguageCode::PorLatn);
    }
}
