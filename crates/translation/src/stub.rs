//! Stub translation engine
//!
//! Produces `"{text} from {source} to {target}"` without loading weights.
//! Used when `translator.stub` is set and throughout the tests.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nllb_core::{Device, Error, LanguageCode, Result, TokenCounter, TokenSink, TranslationEngine};

/// Counts whitespace-separated words
struct WordCounter;

impl TokenCounter for WordCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }
}

/// Records how many stub translations run at the same time
#[derive(Debug, Default)]
pub struct InFlightProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl InFlightProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Highest number of simultaneous translations observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> ProbeGuard {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard(Arc::clone(self))
    }
}

struct ProbeGuard(Arc<InFlightProbe>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
        self.0.completed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct StubEngine {
    name: String,
    loaded: bool,
    latency: Duration,
    failure_marker: Option<String>,
    probe: Option<Arc<InFlightProbe>>,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            name: "stub".to_string(),
            loaded: true,
            latency: Duration::ZERO,
            failure_marker: None,
            probe: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Block for `latency` per translation and per streamed fragment
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail with `EngineFatal` whenever the input contains `marker`
    pub fn with_failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.failure_marker = Some(marker.into());
        self
    }

    pub fn with_probe(mut self, probe: Arc<InFlightProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    fn pause(&self) {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
    }

    fn render(&mut self, text: &str, source: LanguageCode, target: LanguageCode) -> Result<String> {
        if !self.loaded {
            return Err(Error::ModelUnloaded);
        }
        if let Some(marker) = &self.failure_marker {
            if text.contains(marker.as_str()) {
                return Err(Error::EngineFatal(format!("{} failed on request", self.name)));
            }
        }

        self.pause();
        Ok(format!("{text} from {source} to {target}"))
    }
}

impl TranslationEngine for StubEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn translate(&mut self, text: &str, source: LanguageCode, target: LanguageCode) -> Result<String> {
        let _probe = self.probe.as_ref().map(|probe| probe.enter());
        self.render(text, source, target)
    }

    fn translate_stream(
        &mut self,
        text: &str,
        source: LanguageCode,
        target: LanguageCode,
        sink: TokenSink<'_>,
    ) -> Result<()> {
        let _probe = self.probe.as_ref().map(|probe| probe.enter());
        let output = self.render(text, source, target)?;

        for (index, word) in output.split(' ').enumerate() {
            let fragment = if index == 0 {
                word.to_string()
            } else {
                format!(" {word}")
            };
            if sink(fragment).is_break() {
                break;
            }
            self.pause();
        }
        Ok(())
    }

    fn unload_model(&mut self, _to_cpu: bool) -> Result<bool> {
        Ok(std::mem::replace(&mut self.loaded, false))
    }

    fn load_model(&mut self, _keep_cache: bool) -> Result<bool> {
        Ok(!std::mem::replace(&mut self.loaded, true))
    }

    fn token_counter(&self) -> Arc<dyn TokenCounter> {
        Arc::new(WordCounter)
    }
}
