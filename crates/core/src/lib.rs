//! Core traits and types for the NLLB translation service
//!
//! This crate provides foundational types used across all other crates:
//! - The closed set of FLORES-200 language codes
//! - The engine and token-counter traits implemented by real and stub backends
//! - Detection predictions
//! - Error types

pub mod error;
pub mod language;
pub mod traits;

pub use error::{Error, Result};
pub use language::LanguageCode;
pub use traits::{Device, Prediction, TokenCounter, TokenSink, TranslationEngine};
