//! NLLB tokenizer wrapper
//!
//! The source language is an explicit argument of every encode call, so one
//! tokenizer can be shared by any number of engines.

use std::path::Path;

use nllb_core::{Error, LanguageCode, Result, TokenCounter};
use tokenizers::Tokenizer;

const EOS_TOKEN: &str = "</s>";

pub struct NllbTokenizer {
    inner: Tokenizer,
    eos_token_id: u32,
}

impl NllbTokenizer {
    /// Load `tokenizer.json` from a model directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("tokenizer.json");
        let inner = Tokenizer::from_file(&path)
            .map_err(|e| Error::Model(format!("Failed to load tokenizer {}: {}", path.display(), e)))?;
        Self::new(inner)
    }

    pub fn new(inner: Tokenizer) -> Result<Self> {
        let eos_token_id = inner
            .token_to_id(EOS_TOKEN)
            .ok_or_else(|| Error::Model(format!("Tokenizer has no {EOS_TOKEN} token")))?;
        Ok(Self {
            inner,
            eos_token_id,
        })
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }

    /// Id of the `xxx_Yyyy` language-tag token
    pub fn language_token(&self, language: LanguageCode) -> Result<u32> {
        self.inner
            .token_to_id(language.as_str())
            .ok_or_else(|| Error::Model(format!("Tokenizer has no token for {language}")))
    }

    /// `[source tag] text tokens [eos]`
    pub fn encode_source(&self, text: &str, source: LanguageCode) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::EngineFatal(format!("Tokenization failed: {e}")))?;

        let mut ids = Vec::with_capacity(encoding.len() + 2);
        ids.push(self.language_token(source)?);
        ids.extend_from_slice(encoding.get_ids());
        ids.push(self.eos_token_id);
        Ok(ids)
    }

    /// Decode generated ids, dropping language tags and other special tokens
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| Error::EngineFatal(format!("Detokenization failed: {e}")))
    }
}

impl TokenCounter for NllbTokenizer {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| Error::EngineFatal(format!("Tokenization failed: {e}")))?;
        Ok(encoding.len() + 1)
    }
}
