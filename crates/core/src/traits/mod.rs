//! Core traits for pluggable backends

mod translation;

pub use translation::{Device, Prediction, TokenCounter, TokenSink, TranslationEngine};
