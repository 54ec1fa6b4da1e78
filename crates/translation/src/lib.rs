//! NLLB translation
//!
//! Features:
//! - Native NLLB (M2M100) inference on candle
//! - Deterministic stub engine for tests and dry runs
//! - Engine pool handing out exclusive, RAII-released leases
//! - Model lifecycle manager for load/unload cycles
//! - Translation service with streaming and non-streaming output

pub mod generation;
pub mod lifecycle;
pub mod pool;
pub mod service;
pub mod stub;

#[cfg(feature = "candle")]
pub mod nllb;

pub use generation::{greedy_decode, GenerationConfig, IncrementalDetokenizer};
pub use lifecycle::ModelLifecycle;
pub use pool::{EngineLease, EnginePool, PoolStatus};
pub use service::{ServiceLimits, TranslationRequest, TranslationService, TranslationStream};
pub use stub::{InFlightProbe, StubEngine};

#[cfg(feature = "candle")]
pub use nllb::{NllbEngine, NllbTokenizer};

use nllb_config::TranslatorConfig;
use nllb_core::{Result, TranslationEngine};

/// Build the engine pool described by `config`
///
/// Loads `pool_size` independent engines. Falls back to an error when real
/// inference is requested but the crate was built without candle.
pub fn create_pool(config: &TranslatorConfig) -> Result<EnginePool> {
    let mut engines: Vec<Box<dyn TranslationEngine>> = Vec::with_capacity(config.pool_size);

    if config.stub {
        tracing::warn!(pool_size = config.pool_size, "Using stub translation engines");
        for index in 0..config.pool_size {
            engines.push(Box::new(StubEngine::new().named(format!("stub-{index}"))));
        }
        return EnginePool::new(engines, config.dispatch);
    }

    create_nllb_engines(config, &mut engines)?;
    EnginePool::new(engines, config.dispatch)
}

#[cfg(feature = "candle")]
fn create_nllb_engines(
    config: &TranslatorConfig,
    engines: &mut Vec<Box<dyn TranslationEngine>>,
) -> Result<()> {
    let tokenizer = std::sync::Arc::new(NllbTokenizer::from_dir(&config.model_path)?);
    let generation = GenerationConfig::from(config);

    for index in 0..config.pool_size {
        tracing::info!(index, path = ?config.model_path, "Loading NLLB engine");
        let engine = NllbEngine::load(
            format!("nllb-{index}"),
            &config.model_path,
            std::sync::Arc::clone(&tokenizer),
            generation.clone(),
            config.use_cuda,
        )?;
        engines.push(Box::new(engine));
    }

    Ok(())
}

#[cfg(not(feature = "candle"))]
fn create_nllb_engines(
    _config: &TranslatorConfig,
    _engines: &mut Vec<Box<dyn TranslationEngine>>,
) -> Result<()> {
    Err(nllb_core::Error::Config(
        "built without the `candle` feature; enable it or set translator.stub".to_string(),
    ))
}
