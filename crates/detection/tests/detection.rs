use std::sync::Arc;

use nllb_config::DetectorConfig;
use nllb_core::{Error, LanguageCode, Prediction};
use nllb_detection::{LanguageDetector, ScriptedAccurate, ScriptedFast, Thresholds};

fn ensemble() -> LanguageDetector {
    LanguageDetector::new(
        Box::new(ScriptedFast::new(vec![("__label__spa_Latn", 0.6)])),
        Some(Box::new(ScriptedAccurate::new(Some(Prediction::new(
            LanguageCode::GlgLatn,
            0.8,
        ))))),
        &DetectorConfig::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_detections_share_one_ensemble() {
    let detector = Arc::new(ensemble());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let detector = Arc::clone(&detector);
            let thresholds = if i % 2 == 0 {
                Thresholds { fast: 0.5, accurate: 0.35 }
            } else {
                Thresholds { fast: 1.1, accurate: 0.0 }
            };
            tokio::spawn(async move { (i, detector.detect(format!("texto {i}"), thresholds).await) })
        })
        .collect();

    for handle in handles {
        let (i, prediction) = handle.await.unwrap();
        let expected = if i % 2 == 0 {
            LanguageCode::SpaLatn
        } else {
            LanguageCode::GlgLatn
        };
        assert_eq!(prediction.unwrap().language, expected);
    }
}

#[tokio::test]
async fn test_empty_text_rejected() {
    let detector = ensemble();
    assert!(matches!(
        detector.detect(String::new(), Thresholds::default()).await,
        Err(Error::InvalidInput(_))
    ));
}

#[cfg(all(feature = "fasttext", feature = "lingua"))]
#[test]
#[ignore = "requires the fastText model in NLLB_API_TEST_FASTTEXT_PATH"]
fn test_real_models_detect_english() {
    let Some(path) = std::env::var_os("NLLB_API_TEST_FASTTEXT_PATH") else {
        return;
    };
    let config = DetectorConfig {
        fasttext_model_path: path.into(),
        ..Default::default()
    };
    let detector = nllb_detection::create_detector(&config).unwrap();

    let prediction = detector
        .detect_blocking("Hello, world! This is my house!", Thresholds::default())
        .unwrap();
    assert_eq!(prediction.language, LanguageCode::EngLatn);

    let escalated = detector
        .detect_blocking(
            "Hello, world! This is my house!",
            Thresholds { fast: 1.1, accurate: 0.0 },
        )
        .unwrap();
    assert_eq!(escalated.language, LanguageCode::EngLatn);
}
