//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use nllb_config::Settings;
use nllb_detection::{create_detector, LanguageDetector};
use nllb_translation::{create_pool, ModelLifecycle, ServiceLimits, TranslationService};

use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub translation: Arc<TranslationService>,
    /// Load/unload of the engines behind `translation`
    pub lifecycle: Arc<ModelLifecycle>,
    pub detector: LanguageDetector,
}

impl AppState {
    pub fn new(
        settings: Settings,
        translation: TranslationService,
        lifecycle: ModelLifecycle,
        detector: LanguageDetector,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            translation: Arc::new(translation),
            lifecycle: Arc::new(lifecycle),
            detector,
        }
    }

    /// Load every model named in `settings`
    ///
    /// Blocks while weights are read; call from a blocking context.
    pub fn from_settings(settings: Settings) -> Result<Self, ServerError> {
        let pool = create_pool(&settings.translator)?;
        tracing::info!(
            engines = pool.len(),
            strategy = ?pool.strategy(),
            "Translation engines loaded"
        );

        let detector = create_detector(&settings.detector)?;
        tracing::info!(
            accurate_stage = detector.has_accurate_stage(),
            "Language detector loaded"
        );

        let translation =
            TranslationService::new(pool.clone(), ServiceLimits::from(&settings.translator));
        let lifecycle = ModelLifecycle::new(pool);

        Ok(Self::new(settings, translation, lifecycle, detector))
    }
}
