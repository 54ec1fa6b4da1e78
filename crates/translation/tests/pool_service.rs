//! Concurrency tests for the engine pool, service and lifecycle together

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use nllb_config::DispatchStrategy;
use nllb_core::{Error, LanguageCode, TranslationEngine};
use nllb_translation::{
    EnginePool, InFlightProbe, ModelLifecycle, ServiceLimits, StubEngine, TranslationRequest,
    TranslationService,
};

fn stub_pool(size: usize, strategy: DispatchStrategy, probe: &Arc<InFlightProbe>) -> EnginePool {
    let engines = (0..size)
        .map(|i| {
            Box::new(
                StubEngine::new()
                    .named(format!("stub-{i}"))
                    .with_latency(Duration::from_millis(40))
                    .with_failure_marker("<fail>")
                    .with_probe(Arc::clone(probe)),
            ) as Box<dyn TranslationEngine>
        })
        .collect();
    EnginePool::new(engines, strategy).unwrap()
}

fn request(text: &str, source: LanguageCode, target: LanguageCode) -> TranslationRequest {
    TranslationRequest::new(text, source, target).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_share_an_engine() {
    for strategy in [DispatchStrategy::Scan, DispatchStrategy::Queue] {
        let probe = InFlightProbe::new();
        let service = Arc::new(TranslationService::new(
            stub_pool(2, strategy, &probe),
            ServiceLimits::default(),
        ));

        let jobs = [
            ("one", LanguageCode::EngLatn, LanguageCode::SpaLatn),
            ("two", LanguageCode::FraLatn, LanguageCode::DeuLatn),
            ("three", LanguageCode::JpnJpan, LanguageCode::KorHang),
        ];

        let handles: Vec<_> = jobs
            .iter()
            .map(|&(text, source, target)| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.translate(request(text, source, target)).await })
            })
            .collect();

        for (handle, (text, source, target)) in handles.into_iter().zip(jobs) {
            let output = handle.await.unwrap().unwrap();
            assert_eq!(output, format!("{text} from {source} to {target}"));
        }

        assert!(probe.peak() <= 2, "{strategy:?} ran {} at once", probe.peak());
        assert_eq!(probe.completed(), 3);
        assert_eq!(service.pool().status().busy, 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_stream_releases_engine() {
    for strategy in [DispatchStrategy::Scan, DispatchStrategy::Queue] {
        let probe = InFlightProbe::new();
        let service = TranslationService::new(
            stub_pool(1, strategy, &probe),
            ServiceLimits {
                stream_buffer: 1,
                ..ServiceLimits::default()
            },
        );

        let mut stream = service
            .translate_stream(request(
                "a long sentence with many words in it",
                LanguageCode::EngLatn,
                LanguageCode::SpaLatn,
            ))
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        drop(stream);

        let next = tokio::time::timeout(
            Duration::from_secs(2),
            service.translate(request("after", LanguageCode::EngLatn, LanguageCode::SpaLatn)),
        )
        .await
        .unwrap_or_else(|_| panic!("{strategy:?}: engine was never released after the stream was dropped"));
        assert_eq!(next.unwrap(), "after from eng_Latn to spa_Latn");
        assert_eq!(service.pool().status().busy, 0);
    }
}

#[tokio::test]
async fn test_engine_failure_releases_lease() {
    let probe = InFlightProbe::new();
    let service = TranslationService::new(
        stub_pool(1, DispatchStrategy::Scan, &probe),
        ServiceLimits::default(),
    );

    let failed = service
        .translate(request("<fail>", LanguageCode::EngLatn, LanguageCode::SpaLatn))
        .await;
    assert!(matches!(failed, Err(Error::EngineFatal(_))));

    let mut stream = service
        .translate_stream(request("<fail>", LanguageCode::EngLatn, LanguageCode::SpaLatn))
        .await
        .unwrap();
    assert!(matches!(stream.next().await, Some(Err(Error::EngineFatal(_)))));
    assert!(stream.next().await.is_none());

    let ok = tokio::time::timeout(
        Duration::from_secs(2),
        service.translate(request("fine", LanguageCode::EngLatn, LanguageCode::SpaLatn)),
    )
    .await
    .unwrap();
    assert!(ok.is_ok());
}

#[test]
fn test_invalid_requests() {
    assert!(matches!(
        TranslationRequest::new("", LanguageCode::EngLatn, LanguageCode::SpaLatn),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        TranslationRequest::parse("Hello", "eng_Latn", "xx_Yyyy"),
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_lifecycle_gates_translation() {
    let probe = InFlightProbe::new();
    let pool = stub_pool(2, DispatchStrategy::Queue, &probe);
    let service = TranslationService::new(pool.clone(), ServiceLimits::default());
    let lifecycle = ModelLifecycle::new(pool);

    assert!(lifecycle.unload_model(true).await.unwrap());
    assert!(!lifecycle.unload_model(true).await.unwrap());

    let unloaded = service
        .translate(request("Hello", LanguageCode::EngLatn, LanguageCode::SpaLatn))
        .await;
    assert!(matches!(unloaded, Err(Error::ModelUnloaded)));

    assert!(lifecycle.load_model(false).await.unwrap());
    assert!(!lifecycle.load_model(false).await.unwrap());
    assert!(service
        .translate(request("Hello", LanguageCode::EngLatn, LanguageCode::SpaLatn))
        .await
        .is_ok());
}
