//! Constrained greedy decoding and incremental detokenization
//!
//! Both are model-agnostic: decoding drives any `step` closure that returns
//! next-token logits, and detokenization drives any `decode` closure, so the
//! search constraints are testable without weights.

use std::ops::ControlFlow;

use nllb_config::TranslatorConfig;
use nllb_core::{Error, Result};

/// Search constraints applied at every decoding step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Hard bound on generated tokens, guarantees termination
    pub max_decoding_length: usize,
    /// No n-gram of this size may appear twice; 0 disables the check
    pub no_repeat_ngram_size: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_decoding_length: 1024,
            no_repeat_ngram_size: 3,
        }
    }
}

impl From<&TranslatorConfig> for GenerationConfig {
    fn from(config: &TranslatorConfig) -> Self {
        Self {
            max_decoding_length: config.max_decoding_length,
            no_repeat_ngram_size: config.no_repeat_ngram_size,
        }
    }
}

/// Greedy (argmax) decoding under `config`
///
/// `prefix` seeds the decoder and is not part of the returned tokens.
/// `step` maps the full sequence so far to logits for the next token.
/// Tokens in `suppressed` are never emitted. Every emitted token is passed to
/// `on_token` before the next step; `ControlFlow::Break` stops generation early.
pub fn greedy_decode<S, F>(
    prefix: &[u32],
    config: &GenerationConfig,
    eos_token_id: u32,
    suppressed: &[u32],
    mut step: S,
    mut on_token: F,
) -> Result<Vec<u32>>
where
    S: FnMut(&[u32]) -> Result<Vec<f32>>,
    F: FnMut(u32) -> Result<ControlFlow<()>>,
{
    let mut sequence = prefix.to_vec();

    for _ in 0..config.max_decoding_length {
        let mut logits = step(&sequence)?;

        for &token in suppressed {
            mask(&mut logits, token);
        }
        for token in banned_ngram_tokens(&sequence, config.no_repeat_ngram_size) {
            mask(&mut logits, token);
        }

        let next = argmax(&logits)
            .ok_or_else(|| Error::EngineFatal("every candidate token was masked".to_string()))?;

        if next == eos_token_id {
            break;
        }

        sequence.push(next);
        if on_token(next)?.is_break() {
            break;
        }
    }

    Ok(sequence.split_off(prefix.len()))
}

fn mask(logits: &mut [f32], token: u32) {
    if let Some(logit) = logits.get_mut(token as usize) {
        *logit = f32::NEG_INFINITY;
    }
}

fn argmax(logits: &[f32]) -> Option<u32> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, logit)| logit.is_finite())
        .fold(None, |best: Option<(usize, f32)>, (index, &logit)| match best {
            Some((_, top)) if top >= logit => best,
            _ => Some((index, logit)),
        })
        .map(|(index, _)| index as u32)
}

/// Tokens that would complete an n-gram already present in `sequence`
fn banned_ngram_tokens(sequence: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || sequence.len() + 1 < n {
        return Vec::new();
    }

    let context = &sequence[sequence.len() + 1 - n..];
    sequence
        .windows(n)
        .filter(|window| &window[..n - 1] == context)
        .map(|window| window[n - 1])
        .collect()
}

/// Turns a token stream into text fragments without splitting words
///
/// Each push re-decodes a small window of recent tokens and emits only the
/// text that was not emitted before. Fragments are held back until they end
/// on an alphanumeric character, so word-leading spaces and multi-token
/// characters come out intact; `finish` flushes whatever is left.
#[derive(Debug, Default)]
pub struct IncrementalDetokenizer {
    tokens: Vec<u32>,
    prev_index: usize,
    current_index: usize,
}

impl IncrementalDetokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<D>(&mut self, token: u32, decode: D) -> Result<Option<String>>
    where
        D: Fn(&[u32]) -> Result<String>,
    {
        let prev_text = decode(&self.tokens[self.prev_index..self.current_index])?;
        self.tokens.push(token);
        let text = decode(&self.tokens[self.prev_index..])?;

        let complete = text.chars().last().is_some_and(char::is_alphanumeric);
        match text.get(prev_text.len()..) {
            Some(fragment) if complete && !fragment.is_empty() => {
                let fragment = fragment.to_string();
                self.prev_index = self.current_index;
                self.current_index = self.tokens.len();
                Ok(Some(fragment))
            }
            _ => Ok(None),
        }
    }

    pub fn finish<D>(&mut self, decode: D) -> Result<Option<String>>
    where
        D: Fn(&[u32]) -> Result<String>,
    {
        let prev_text = decode(&self.tokens[self.prev_index..self.current_index])?;
        let text = decode(&self.tokens[self.prev_index..])?;
        self.prev_index = self.current_index;
        self.current_index = self.tokens.len();

        Ok(text
            .get(prev_text.len()..)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EOS: u32 = 2;

    /// Logits that always prefer `scripted[len - prefix]`, then EOS
    fn scripted(prefix_len: usize, script: Vec<u32>, vocab: usize) -> impl FnMut(&[u32]) -> Result<Vec<f32>> {
        move |sequence: &[u32]| {
            let position = sequence.len() - prefix_len;
            let mut logits = vec![0.0; vocab];
            let favourite = script.get(position).copied().unwrap_or(EOS);
            logits[favourite as usize] = 10.0;
            Ok(logits)
        }
    }

    fn keep_going(_: u32) -> Result<ControlFlow<()>> {
        Ok(ControlFlow::Continue(()))
    }

    #[test]
    fn test_stops_at_eos_and_excludes_prefix() {
        let config = GenerationConfig::default();
        let out = greedy_decode(&[2, 7], &config, EOS, &[], scripted(2, vec![5, 6], 10), keep_going)
            .unwrap();
        assert_eq!(out, vec![5, 6]);
    }

    #[test]
    fn test_max_length_bounds_generation() {
        let config = GenerationConfig {
            max_decoding_length: 4,
            no_repeat_ngram_size: 0,
        };
        let step = |_: &[u32]| -> Result<Vec<f32>> { Ok(vec![0.0, 0.0, 0.0, 9.0]) };
        let out = greedy_decode(&[2], &config, EOS, &[], step, keep_going).unwrap();
        assert_eq!(out, vec![3, 3, 3, 3]);
    }

    #[test]
    fn test_suppressed_token_never_emitted() {
        let config = GenerationConfig::default();
        // token 7 (the target tag) is the favourite but suppressed; 4 is runner-up
        let step = |sequence: &[u32]| -> Result<Vec<f32>> {
            let mut logits = vec![0.0; 8];
            logits[7] = 10.0;
            logits[4] = 5.0;
            if sequence.len() > 2 {
                logits[EOS as usize] = 20.0;
            }
            Ok(logits)
        };
        let out = greedy_decode(&[2, 7], &config, EOS, &[7], step, keep_going).unwrap();
        assert_eq!(out, vec![4]);
    }

    #[test]
    fn test_no_repeat_ngram() {
        let config = GenerationConfig {
            max_decoding_length: 6,
            no_repeat_ngram_size: 3,
        };
        // The model loves 5, with 6 as runner-up
        let step = |_: &[u32]| -> Result<Vec<f32>> {
            let mut logits = vec![0.0; 8];
            logits[5] = 10.0;
            logits[6] = 5.0;
            Ok(logits)
        };
        let out = greedy_decode(&[2], &config, EOS, &[], step, keep_going).unwrap();
        assert_eq!(out, vec![5, 5, 5, 6, 5, 5]);

        let mut full = vec![2];
        full.extend(&out);
        let trigrams: Vec<_> = full.windows(3).collect();
        for (i, a) in trigrams.iter().enumerate() {
            assert!(trigrams[i + 1..].iter().all(|b| b != a), "{a:?} repeated");
        }
    }

    #[test]
    fn test_banned_tokens_from_history() {
        assert_eq!(banned_ngram_tokens(&[1, 2, 3, 1, 2], 3), vec![3]);
        assert_eq!(banned_ngram_tokens(&[1, 2, 3, 1, 2], 0), Vec::<u32>::new());
        assert_eq!(banned_ngram_tokens(&[1], 3), Vec::<u32>::new());
        assert_eq!(banned_ngram_tokens(&[4, 4], 2), vec![4]);
    }

    #[test]
    fn test_callback_break_stops_generation() {
        let config = GenerationConfig::default();
        let mut seen = Vec::new();
        let out = greedy_decode(
            &[2],
            &config,
            EOS,
            &[],
            scripted(1, vec![3, 4, 5, 6], 10),
            |token| {
                seen.push(token);
                Ok(if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            },
        )
        .unwrap();
        assert_eq!(out, vec![3, 4]);
        assert_eq!(seen, vec![3, 4]);
    }

    #[test]
    fn test_fully_masked_logits_are_fatal() {
        let config = GenerationConfig::default();
        let step = |_: &[u32]| -> Result<Vec<f32>> { Ok(vec![0.0; 3]) };
        let err = greedy_decode(&[2], &config, EOS, &[0, 1, 2], step, keep_going).unwrap_err();
        assert!(matches!(err, Error::EngineFatal(_)));
    }

    /// SentencePiece-style vocabulary: '▁' marks a word start, stripped at the
    /// start of a decoded span
    fn decode(ids: &[u32]) -> Result<String> {
        let vocab = ["▁¡", "Hola", ",", "▁mundo", "!"];
        let joined: String = ids.iter().map(|&id| vocab[id as usize]).collect();
        let text = joined.replace('▁', " ");
        Ok(text.strip_prefix(' ').unwrap_or(&text).to_string())
    }

    #[test]
    fn test_incremental_detokenizer_preserves_spacing() {
        let mut detok = IncrementalDetokenizer::new();
        let mut fragments = Vec::new();
        for token in 0..5 {
            if let Some(fragment) = detok.push(token, decode).unwrap() {
                fragments.push(fragment);
            }
        }
        if let Some(rest) = detok.finish(decode).unwrap() {
            fragments.push(rest);
        }

        assert_eq!(fragments, vec!["¡Hola", ", mundo", "!"]);
        assert_eq!(fragments.concat(), "¡Hola, mundo!");
    }

    #[test]
    fn test_finish_on_empty_stream() {
        let mut detok = IncrementalDetokenizer::new();
        assert_eq!(detok.finish(decode).unwrap(), None);
    }
}
