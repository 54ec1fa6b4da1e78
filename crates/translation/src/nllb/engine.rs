//! NLLB translation engine
//!
//! One engine owns one copy of the weights. Unloading drops the device copy;
//! with an accelerator and `to_cpu` the weights are parked in host memory so
//! the next load skips the disk.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device as CandleDevice, Tensor};
use candle_nn::VarBuilder;

use nllb_core::{Device, Error, LanguageCode, Result, TokenCounter, TokenSink, TranslationEngine};

use super::model::{NllbConfig, NllbModel};
use super::tokenizer::NllbTokenizer;
use crate::generation::{greedy_decode, GenerationConfig, IncrementalDetokenizer};

fn engine_error(e: candle_core::Error) -> Error {
    Error::EngineFatal(format!("Candle error: {e}"))
}

fn model_error(e: candle_core::Error) -> Error {
    Error::Model(format!("Candle error: {e}"))
}

struct Resident {
    model: NllbModel,
    tensors: HashMap<String, Tensor>,
}

pub struct NllbEngine {
    name: String,
    weights_path: PathBuf,
    config: NllbConfig,
    tokenizer: Arc<NllbTokenizer>,
    generation: GenerationConfig,
    device: CandleDevice,
    resident: Option<Resident>,
    host_cache: Option<HashMap<String, Tensor>>,
}

impl NllbEngine {
    /// Load `config.json` and `model.safetensors` from `dir` onto the CPU, or
    /// the first CUDA device when `use_cuda` is set
    pub fn load(
        name: impl Into<String>,
        dir: &Path,
        tokenizer: Arc<NllbTokenizer>,
        generation: GenerationConfig,
        use_cuda: bool,
    ) -> Result<Self> {
        let config_path = dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            Error::Model(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        let config: NllbConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Model(format!("Failed to parse config: {e}")))?;

        let device = if use_cuda {
            CandleDevice::new_cuda(0).map_err(model_error)?
        } else {
            CandleDevice::Cpu
        };

        let mut engine = Self {
            name: name.into(),
            weights_path: dir.join("model.safetensors"),
            config,
            tokenizer,
            generation,
            device,
            resident: None,
            host_cache: None,
        };
        engine.load_model(false)?;
        Ok(engine)
    }

    fn accelerated(&self) -> bool {
        !self.device.is_cpu()
    }

    fn read_weights(&self) -> Result<HashMap<String, Tensor>> {
        tracing::debug!(engine = %self.name, path = ?self.weights_path, "Reading weights");
        candle_core::safetensors::load(&self.weights_path, &CandleDevice::Cpu).map_err(model_error)
    }

    fn build(&self, host_tensors: &HashMap<String, Tensor>) -> Result<Resident> {
        let tensors = host_tensors
            .iter()
            .map(|(name, tensor)| Ok((name.clone(), tensor.to_device(&self.device)?)))
            .collect::<candle_core::Result<HashMap<_, _>>>()
            .map_err(model_error)?;

        let vb = VarBuilder::from_tensors(tensors.clone(), DType::F32, &self.device);
        let model = NllbModel::new(&self.config, vb).map_err(model_error)?;
        Ok(Resident { model, tensors })
    }

    /// Run constrained greedy generation, reporting each new token
    fn generate(
        &self,
        text: &str,
        source: LanguageCode,
        target: LanguageCode,
        on_token: &mut dyn FnMut(u32) -> Result<ControlFlow<()>>,
    ) -> Result<Vec<u32>> {
        let resident = self.resident.as_ref().ok_or(Error::ModelUnloaded)?;

        let input_ids = self.tokenizer.encode_source(text, source)?;
        let target_token = self.tokenizer.language_token(target)?;
        let encoder_out = resident.model.encode(&input_ids).map_err(engine_error)?;

        let prefix = [self.config.decoder_start_token_id, target_token];
        let generation = GenerationConfig {
            max_decoding_length: self
                .generation
                .max_decoding_length
                .min(self.config.max_position_embeddings.saturating_sub(prefix.len())),
            ..self.generation.clone()
        };

        greedy_decode(
            &prefix,
            &generation,
            self.tokenizer.eos_token_id(),
            &[target_token],
            |sequence| {
                resident
                    .model
                    .next_token_logits(sequence, &encoder_out)
                    .map_err(engine_error)
            },
            on_token,
        )
    }
}

impl TranslationEngine for NllbEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> Device {
        if self.accelerated() {
            Device::Accelerator
        } else {
            Device::Cpu
        }
    }

    fn is_loaded(&self) -> bool {
        self.resident.is_some()
    }

    fn translate(&mut self, text: &str, source: LanguageCode, target: LanguageCode) -> Result<String> {
        let tokens = self.generate(text, source, target, &mut |_| Ok(ControlFlow::Continue(())))?;
        self.tokenizer.decode(&tokens)
    }

    fn translate_stream(
        &mut self,
        text: &str,
        source: LanguageCode,
        target: LanguageCode,
        sink: TokenSink<'_>,
    ) -> Result<()> {
        let tokenizer = Arc::clone(&self.tokenizer);
        let decode = |ids: &[u32]| tokenizer.decode(ids);
        let mut detokenizer = IncrementalDetokenizer::new();
        let mut consumer_gone = false;

        self.generate(text, source, target, &mut |token| {
            if let Some(fragment) = detokenizer.push(token, decode)? {
                if sink(fragment).is_break() {
                    consumer_gone = true;
                    return Ok(ControlFlow::Break(()));
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;

        if consumer_gone {
            tracing::debug!(engine = %self.name, "Stream consumer went away, generation stopped");
        } else if let Some(rest) = detokenizer.finish(decode)? {
            let _ = sink(rest);
        }
        Ok(())
    }

    fn unload_model(&mut self, to_cpu: bool) -> Result<bool> {
        let Some(resident) = self.resident.take() else {
            return Ok(false);
        };

        if self.accelerated() && to_cpu {
            let host = resident
                .tensors
                .iter()
                .map(|(name, tensor)| Ok((name.clone(), tensor.to_device(&CandleDevice::Cpu)?)))
                .collect::<candle_core::Result<HashMap<_, _>>>()
                .map_err(model_error)?;
            self.host_cache = Some(host);
        }

        tracing::info!(engine = %self.name, to_cpu, "Unloaded model");
        Ok(true)
    }

    fn load_model(&mut self, keep_cache: bool) -> Result<bool> {
        if self.resident.is_some() {
            return Ok(false);
        }

        let host = match self.host_cache.take() {
            Some(cached) => cached,
            None => self.read_weights()?,
        };
        self.resident = Some(self.build(&host)?);

        if self.accelerated() && keep_cache {
            self.host_cache = Some(host);
        }

        tracing::info!(engine = %self.name, device = ?self.device(), "Loaded model");
        Ok(true)
    }

    fn token_counter(&self) -> Arc<dyn TokenCounter> {
        self.tokenizer.clone()
    }
}
