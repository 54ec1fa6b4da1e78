//! Translation service
//!
//! Validates requests, leases an engine from the pool and runs inference on
//! the blocking pool. Streaming runs the engine on a blocking task feeding a
//! bounded channel; the returned stream drains it.

use std::ops::ControlFlow;
use std::pin::Pin;

use futures::Stream;
use nllb_config::TranslatorConfig;
use nllb_core::{Error, LanguageCode, Result};
use tokio::sync::mpsc;

use crate::pool::EnginePool;

/// Lazily produced translation fragments, in generation order
pub type TranslationStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A validated translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub source: LanguageCode,
    pub target: LanguageCode,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, source: LanguageCode, target: LanguageCode) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(Error::InvalidInput("text must not be empty".to_string()));
        }
        Ok(Self {
            text,
            source,
            target,
        })
    }

    /// Validate raw language codes as well as the text
    pub fn parse(text: impl Into<String>, source: &str, target: &str) -> Result<Self> {
        Self::new(text, source.parse()?, target.parse()?)
    }
}

/// Request limits checked before an engine is leased
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLimits {
    pub max_input_chars: usize,
    pub max_input_tokens: usize,
    pub stream_buffer: usize,
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self::from(&TranslatorConfig::default())
    }
}

impl From<&TranslatorConfig> for ServiceLimits {
    fn from(config: &TranslatorConfig) -> Self {
        Self {
            max_input_chars: config.max_input_chars,
            max_input_tokens: config.max_input_tokens,
            stream_buffer: config.stream_buffer,
        }
    }
}

pub struct TranslationService {
    pool: EnginePool,
    limits: ServiceLimits,
}

impl TranslationService {
    pub fn new(pool: EnginePool, limits: ServiceLimits) -> Self {
        Self { pool, limits }
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    /// Translate and return the completed output
    pub async fn translate(&self, request: TranslationRequest) -> Result<String> {
        self.check_limits(&request.text)?;
        tracing::debug!(
            source = %request.source,
            target = %request.target,
            chars = request.text.chars().count(),
            "Translating"
        );

        let lease = self.pool.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let mut engine = lease.engine();
            engine.translate(&request.text, request.source, request.target)
        })
        .await
        .map_err(|e| Error::EngineFatal(format!("Translation task failed: {e}")))?
    }

    /// Translate, yielding fragments as soon as the engine produces them
    ///
    /// The engine stays leased until generation ends or the stream is
    /// dropped, whichever comes first.
    pub async fn translate_stream(&self, request: TranslationRequest) -> Result<TranslationStream> {
        self.check_limits(&request.text)?;
        tracing::debug!(
            source = %request.source,
            target = %request.target,
            "Streaming translation"
        );

        let lease = self.pool.acquire().await?;
        let (tx, mut rx) = mpsc::channel::<String>(self.limits.stream_buffer);

        let worker = tokio::task::spawn_blocking(move || {
            let mut engine = lease.engine();
            engine.translate_stream(
                &request.text,
                request.source,
                request.target,
                &mut |fragment| match tx.blocking_send(fragment) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => ControlFlow::Break(()),
                },
            )
        });

        Ok(Box::pin(async_stream::stream! {
            while let Some(fragment) = rx.recv().await {
                yield Ok(fragment);
            }

            match worker.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => yield Err(e),
                Err(e) => yield Err(Error::EngineFatal(format!("Streaming task failed: {e}"))),
            }
        }))
    }

    /// Tokens `text` would occupy, including the language tag
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        self.pool.token_counter().count_tokens(text)
    }

    fn check_limits(&self, text: &str) -> Result<()> {
        let chars = text.chars().count();
        if chars > self.limits.max_input_chars {
            return Err(Error::InvalidInput(format!(
                "text is {chars} characters, the limit is {}",
                self.limits.max_input_chars
            )));
        }

        let tokens = self.pool.token_counter().count_tokens(text)?;
        if tokens > self.limits.max_input_tokens {
            return Err(Error::InvalidInput(format!(
                "text is {tokens} tokens, the limit is {}",
                self.limits.max_input_tokens
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubEngine;
    use futures::StreamExt;
    use nllb_config::DispatchStrategy;
    use nllb_core::TranslationEngine;

    fn service() -> TranslationService {
        let engines: Vec<Box<dyn TranslationEngine>> = vec![Box::new(StubEngine::new())];
        let pool = EnginePool::new(engines, DispatchStrategy::Queue).unwrap();
        TranslationService::new(
            pool,
            ServiceLimits {
                max_input_chars: 20,
                max_input_tokens: 3,
                stream_buffer: 4,
            },
        )
    }

    #[test]
    fn test_request_validation() {
        assert!(TranslationRequest::parse("Hello", "eng_Latn", "spa_Latn").is_ok());
        assert!(matches!(
            TranslationRequest::parse("", "eng_Latn", "spa_Latn"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            TranslationRequest::parse("Hello", "english", "spa_Latn"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            TranslationRequest::parse("Hello", "eng_Latn", "spa"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_whitespace_only_text_is_translated() {
        let service = service();
        let request = TranslationRequest::parse("   ", "eng_Latn", "spa_Latn").unwrap();
        assert_eq!(request.text, "   ");
        assert_eq!(
            service.translate(request).await.unwrap(),
            "    from eng_Latn to spa_Latn"
        );
    }

    #[tokio::test]
    async fn test_translate() {
        let service = service();
        let request = TranslationRequest::parse("Hello", "eng_Latn", "spa_Latn").unwrap();
        assert_eq!(
            service.translate(request).await.unwrap(),
            "Hello from eng_Latn to spa_Latn"
        );
    }

    #[tokio::test]
    async fn test_limits_checked_before_leasing() {
        let service = service();
        let _held = service.pool().acquire().await.unwrap();

        // The only engine is leased, so reaching the pool would hang
        let too_long = TranslationRequest::parse("x".repeat(21), "eng_Latn", "spa_Latn").unwrap();
        assert!(matches!(
            service.translate(too_long).await,
            Err(Error::InvalidInput(_))
        ));

        let too_many_tokens =
            TranslationRequest::parse("a b c d", "eng_Latn", "spa_Latn").unwrap();
        assert!(matches!(
            service.translate_stream(too_many_tokens).await.err(),
            Some(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_in_order() {
        let service = service();
        let request = TranslationRequest::parse("Hi", "eng_Latn", "ita_Latn").unwrap();
        let fragments: Vec<String> = service
            .translate_stream(request)
            .await
            .unwrap()
            .map(|fragment| fragment.unwrap())
            .collect()
            .await;

        assert_eq!(fragments, vec!["Hi", " from", " eng_Latn", " to", " ita_Latn"]);
    }

    #[tokio::test]
    async fn test_count_tokens() {
        let service = service();
        assert_eq!(service.count_tokens("one two").unwrap(), 2);
        assert_eq!(service.count_tokens("").unwrap(), 0);
        assert_eq!(service.count_tokens("  \n ").unwrap(), 0);
    }
}
