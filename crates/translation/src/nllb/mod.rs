//! NLLB-200 on candle
//!
//! - `model`: M2M100 encoder-decoder
//! - `tokenizer`: stateless source encoding and decoding
//! - `engine`: the `TranslationEngine` tying both to constrained generation

mod engine;
mod model;
mod tokenizer;

pub use engine::NllbEngine;
pub use model::{Activation, NllbConfig, NllbModel};
pub use tokenizer::NllbTokenizer;
