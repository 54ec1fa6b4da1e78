//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Translation engine and pool configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Language detection configuration
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_translator()?;
        self.validate_detector()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "Port must be non-zero".to_string()));
        }

        if !self.server.root_path.is_empty() && !self.server.root_path.starts_with('/') {
            return Err(invalid(
                "server.root_path",
                format!("Must start with '/', got '{}'", self.server.root_path),
            ));
        }

        Ok(())
    }

    fn validate_translator(&self) -> Result<(), ConfigError> {
        let translator = &self.translator;

        if translator.pool_size == 0 {
            return Err(invalid(
                "translator.pool_size",
                "At least one engine is required".to_string(),
            ));
        }

        if translator.worker_threads == 0 {
            return Err(invalid(
                "translator.worker_threads",
                "At least one worker thread is required".to_string(),
            ));
        }

        if translator.max_decoding_length == 0 {
            return Err(invalid(
                "translator.max_decoding_length",
                "Must be greater than zero".to_string(),
            ));
        }

        if translator.max_input_chars == 0 || translator.max_input_tokens == 0 {
            return Err(invalid(
                "translator.max_input_chars",
                "Input limits must be greater than zero".to_string(),
            ));
        }

        if translator.stream_buffer == 0 {
            return Err(invalid(
                "translator.stream_buffer",
                "Must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_detector(&self) -> Result<(), ConfigError> {
        let detector = &self.detector;

        if !(0.0..=1.0).contains(&detector.fast_threshold) {
            return Err(invalid(
                "detector.fast_threshold",
                format!("Must be between 0.0 and 1.0, got {}", detector.fast_threshold),
            ));
        }

        if !(0.0..=1.0).contains(&detector.accurate_threshold) {
            return Err(invalid(
                "detector.accurate_threshold",
                format!(
                    "Must be between 0.0 and 1.0, got {}",
                    detector.accurate_threshold
                ),
            ));
        }

        if detector.top_k == 0 {
            return Err(invalid("detector.top_k", "Must be greater than zero".to_string()));
        }

        if detector.max_text_chars == 0 {
            return Err(invalid(
                "detector.max_text_chars",
                "Must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix every route is nested under
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Name reported by the health badge
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    49494
}

fn default_root_path() -> String {
    "/api".to_string()
}

fn default_app_name() -> String {
    "nllb-api".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root_path: default_root_path(),
            app_name: default_app_name(),
        }
    }
}

/// How a request waits for a free engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStrategy {
    /// Cyclic scan over the engines, yielding to the scheduler between misses
    Scan,
    /// FIFO wait queue with one permit per engine
    #[default]
    Queue,
}

/// Translation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Directory holding config.json, model.safetensors and tokenizer.json
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Number of engine instances; 1 keeps a single shared engine
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Size of the blocking pool inference is offloaded to
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Place weights on the first CUDA device
    #[serde(default)]
    pub use_cuda: bool,

    /// Serve deterministic synthetic translations instead of loading weights
    #[serde(default)]
    pub stub: bool,

    #[serde(default)]
    pub dispatch: DispatchStrategy,

    /// Longest accepted input, in characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Longest accepted input, in tokens
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    /// Upper bound on generated tokens
    #[serde(default = "default_max_decoding_length")]
    pub max_decoding_length: usize,

    #[serde(default = "default_no_repeat_ngram_size")]
    pub no_repeat_ngram_size: usize,

    /// Chunks buffered between a streaming engine and its consumer
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/nllb-200-distilled-600M")
}

fn default_pool_size() -> usize {
    1
}

fn default_worker_threads() -> usize {
    4
}

fn default_max_input_chars() -> usize {
    4096
}

fn default_max_input_tokens() -> usize {
    1024
}

fn default_max_decoding_length() -> usize {
    1024
}

fn default_no_repeat_ngram_size() -> usize {
    3
}

fn default_stream_buffer() -> usize {
    32
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            pool_size: default_pool_size(),
            worker_threads: default_worker_threads(),
            use_cuda: false,
            stub: false,
            dispatch: DispatchStrategy::default(),
            max_input_chars: default_max_input_chars(),
            max_input_tokens: default_max_input_tokens(),
            max_decoding_length: default_max_decoding_length(),
            no_repeat_ngram_size: default_no_repeat_ngram_size(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

/// Language detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// fastText language-identification model (.bin)
    #[serde(default = "default_fasttext_model_path")]
    pub fasttext_model_path: PathBuf,

    /// Answer every request with English instead of loading classifiers
    #[serde(default)]
    pub stub: bool,

    /// Default fast-classifier confidence needed to skip the accurate stage
    #[serde(default = "default_fast_threshold")]
    pub fast_threshold: f64,

    /// Default accurate-classifier confidence needed to override the fast stage
    #[serde(default = "default_accurate_threshold")]
    pub accurate_threshold: f64,

    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Fast-classifier candidates inspected when skipping noise labels
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Run the accurate stage at all
    #[serde(default = "default_true")]
    pub accurate_enabled: bool,
}

fn default_fasttext_model_path() -> PathBuf {
    PathBuf::from("models/fasttext-language-identification/model.bin")
}

fn default_fast_threshold() -> f64 {
    0.85
}

fn default_accurate_threshold() -> f64 {
    0.35
}

fn default_max_text_chars() -> usize {
    512
}

fn default_top_k() -> usize {
    24
}

fn default_true() -> bool {
    true
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fasttext_model_path: default_fasttext_model_path(),
            stub: false,
            fast_threshold: default_fast_threshold(),
            accurate_threshold: default_accurate_threshold(),
            max_text_chars: default_max_text_chars(),
            top_k: default_top_k(),
            accurate_enabled: true,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from `config/` and the environment
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from `{dir}/default`, then `{dir}/{env}`, then `NLLB_API__*`
/// environment variables, each layer overriding the previous one
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::from(dir.join("default")).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("NLLB_API")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    // Validate
    settings.validate()?;

    Ok(settings)
}
