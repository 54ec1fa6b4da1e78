//! NLLB (M2M100) encoder-decoder on candle
//!
//! Pre-norm transformer with sinusoidal positions and a shared source/target
//! embedding tied to the LM head. Weight names follow the Hugging Face
//! `M2M100ForConditionalGeneration` layout.

use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{embedding, layer_norm, linear, linear_no_bias, Embedding, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;

pub(crate) type CandleResult<T> = std::result::Result<T, candle_core::Error>;

// ========================================================================
// Configuration
// ========================================================================

/// Hyper-parameters read from the model's `config.json`
#[derive(Debug, Clone, Deserialize)]
pub struct NllbConfig {
    #[serde(default = "default_d_model")]
    pub d_model: usize,
    #[serde(default = "default_layers")]
    pub encoder_layers: usize,
    #[serde(default = "default_layers")]
    pub decoder_layers: usize,
    #[serde(default = "default_heads")]
    pub encoder_attention_heads: usize,
    #[serde(default = "default_heads")]
    pub decoder_attention_heads: usize,
    #[serde(default = "default_ffn_dim")]
    pub encoder_ffn_dim: usize,
    #[serde(default = "default_ffn_dim")]
    pub decoder_ffn_dim: usize,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(default = "default_pad_token_id")]
    pub pad_token_id: u32,
    #[serde(default = "default_eos_token_id")]
    pub eos_token_id: u32,
    #[serde(default = "default_eos_token_id")]
    pub decoder_start_token_id: u32,
    #[serde(default = "default_true")]
    pub scale_embedding: bool,
    #[serde(default)]
    pub activation_function: Activation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Gelu,
    #[default]
    Relu,
}

fn default_d_model() -> usize {
    1024
}
fn default_layers() -> usize {
    12
}
fn default_heads() -> usize {
    16
}
fn default_ffn_dim() -> usize {
    4096
}
fn default_vocab_size() -> usize {
    256206
}
fn default_max_position_embeddings() -> usize {
    1024
}
fn default_pad_token_id() -> u32 {
    1
}
fn default_eos_token_id() -> u32 {
    2
}
fn default_true() -> bool {
    true
}

impl NllbConfig {
    fn embed_scale(&self) -> f64 {
        if self.scale_embedding {
            (self.d_model as f64).sqrt()
        } else {
            1.0
        }
    }

    /// Position table rows; ids start at `pad_token_id + 1`
    fn num_positions(&self) -> usize {
        self.max_position_embeddings + self.pad_token_id as usize + 1
    }
}

// ========================================================================
// Sinusoidal Positional Embedding
// ========================================================================

fn sinusoidal_positions(
    num_positions: usize,
    dim: usize,
    padding_idx: usize,
    device: &Device,
) -> CandleResult<Tensor> {
    let half = dim / 2;
    let step = (10_000f64).ln() / (half as f64 - 1.0);
    let mut table = vec![0f32; num_positions * dim];

    for position in (0..num_positions).filter(|&p| p != padding_idx) {
        let row = &mut table[position * dim..(position + 1) * dim];
        for i in 0..half {
            let angle = position as f64 * (-step * i as f64).exp();
            row[i] = angle.sin() as f32;
            row[half + i] = angle.cos() as f32;
        }
    }

    Tensor::from_vec(table, (num_positions, dim), device)
}

fn position_embeddings(
    table: &Tensor,
    first_position: usize,
    seq_len: usize,
) -> CandleResult<Tensor> {
    table.narrow(0, first_position, seq_len)?.unsqueeze(0)
}

// ========================================================================
// Multi-Head Attention
// ========================================================================

struct Attention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
}

impl Attention {
    fn new(embed_dim: usize, num_heads: usize, vb: VarBuilder) -> CandleResult<Self> {
        let head_dim = embed_dim / num_heads;
        Ok(Self {
            q_proj: linear(embed_dim, embed_dim, vb.pp("q_proj"))?,
            k_proj: linear(embed_dim, embed_dim, vb.pp("k_proj"))?,
            v_proj: linear(embed_dim, embed_dim, vb.pp("v_proj"))?,
            out_proj: linear(embed_dim, embed_dim, vb.pp("out_proj"))?,
            num_heads,
            head_dim,
            scale: (head_dim as f64).powf(-0.5),
        })
    }

    fn split_heads(&self, x: &Tensor) -> CandleResult<Tensor> {
        let (batch, len, _) = x.dims3()?;
        x.reshape((batch, len, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn forward(&self, query: &Tensor, key_value: &Tensor, mask: Option<&Tensor>) -> CandleResult<Tensor> {
        let (batch, tgt_len, _) = query.dims3()?;

        let q = self.split_heads(&(self.q_proj.forward(query)? * self.scale)?)?;
        let k = self.split_heads(&self.k_proj.forward(key_value)?)?;
        let v = self.split_heads(&self.v_proj.forward(key_value)?)?;

        let scores = q.matmul(&k.transpose(2, 3)?.contiguous()?)?;
        let scores = match mask {
            Some(mask) => scores.broadcast_add(mask)?,
            None => scores,
        };
        let weights = candle_nn::ops::softmax_last_dim(&scores)?;

        let output = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((batch, tgt_len, self.num_heads * self.head_dim))?;
        self.out_proj.forward(&output)
    }
}

struct FeedForward {
    fc1: Linear,
    fc2: Linear,
    activation: Activation,
}

impl FeedForward {
    fn new(embed_dim: usize, ffn_dim: usize, activation: Activation, vb: &VarBuilder) -> CandleResult<Self> {
        Ok(Self {
            fc1: linear(embed_dim, ffn_dim, vb.pp("fc1"))?,
            fc2: linear(ffn_dim, embed_dim, vb.pp("fc2"))?,
            activation,
        })
    }

    fn forward(&self, x: &Tensor) -> CandleResult<Tensor> {
        let x = self.fc1.forward(x)?;
        let x = match self.activation {
            Activation::Gelu => x.gelu()?,
            Activation::Relu => x.relu()?,
        };
        self.fc2.forward(&x)
    }
}

// ========================================================================
// Encoder
// ========================================================================

struct EncoderLayer {
    self_attn: Attention,
    self_attn_layer_norm: LayerNorm,
    ffn: FeedForward,
    final_layer_norm: LayerNorm,
}

impl EncoderLayer {
    fn new(config: &NllbConfig, vb: VarBuilder) -> CandleResult<Self> {
        let dim = config.d_model;
        Ok(Self {
            self_attn: Attention::new(dim, config.encoder_attention_heads, vb.pp("self_attn"))?,
            self_attn_layer_norm: layer_norm(dim, 1e-5, vb.pp("self_attn_layer_norm"))?,
            ffn: FeedForward::new(dim, config.encoder_ffn_dim, config.activation_function, &vb)?,
            final_layer_norm: layer_norm(dim, 1e-5, vb.pp("final_layer_norm"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> CandleResult<Tensor> {
        let normed = self.self_attn_layer_norm.forward(x)?;
        let x = (x + self.self_attn.forward(&normed, &normed, None)?)?;

        let normed = self.final_layer_norm.forward(&x)?;
        &x + self.ffn.forward(&normed)?
    }
}

struct Encoder {
    embed_tokens: Embedding,
    embed_positions: Tensor,
    embed_scale: f64,
    first_position: usize,
    layers: Vec<EncoderLayer>,
    layer_norm: LayerNorm,
}

impl Encoder {
    fn new(config: &NllbConfig, shared: Embedding, vb: VarBuilder) -> CandleResult<Self> {
        let layers = (0..config.encoder_layers)
            .map(|i| EncoderLayer::new(config, vb.pp(format!("layers.{i}"))))
            .collect::<CandleResult<Vec<_>>>()?;

        Ok(Self {
            embed_tokens: shared,
            embed_positions: sinusoidal_positions(
                config.num_positions(),
                config.d_model,
                config.pad_token_id as usize,
                vb.device(),
            )?,
            embed_scale: config.embed_scale(),
            first_position: config.pad_token_id as usize + 1,
            layers,
            layer_norm: layer_norm(config.d_model, 1e-5, vb.pp("layer_norm"))?,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> CandleResult<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;

        let embeds = (self.embed_tokens.forward(input_ids)? * self.embed_scale)?;
        let positions = position_embeddings(&self.embed_positions, self.first_position, seq_len)?;
        let mut hidden = embeds.broadcast_add(&positions)?;

        for layer in &self.layers {
            hidden = layer.forward(&hidden)?;
        }

        self.layer_norm.forward(&hidden)
    }
}

// ========================================================================
// Decoder
// ========================================================================

struct DecoderLayer {
    self_attn: Attention,
    self_attn_layer_norm: LayerNorm,
    encoder_attn: Attention,
    encoder_attn_layer_norm: LayerNorm,
    ffn: FeedForward,
    final_layer_norm: LayerNorm,
}

impl DecoderLayer {
    fn new(config: &NllbConfig, vb: VarBuilder) -> CandleResult<Self> {
        let dim = config.d_model;
        let heads = config.decoder_attention_heads;
        Ok(Self {
            self_attn: Attention::new(dim, heads, vb.pp("self_attn"))?,
            self_attn_layer_norm: layer_norm(dim, 1e-5, vb.pp("self_attn_layer_norm"))?,
            encoder_attn: Attention::new(dim, heads, vb.pp("encoder_attn"))?,
            encoder_attn_layer_norm: layer_norm(dim, 1e-5, vb.pp("encoder_attn_layer_norm"))?,
            ffn: FeedForward::new(dim, config.decoder_ffn_dim, config.activation_function, &vb)?,
            final_layer_norm: layer_norm(dim, 1e-5, vb.pp("final_layer_norm"))?,
        })
    }

    fn forward(&self, x: &Tensor, encoder_out: &Tensor, causal_mask: &Tensor) -> CandleResult<Tensor> {
        let normed = self.self_attn_layer_norm.forward(x)?;
        let x = (x + self.self_attn.forward(&normed, &normed, Some(causal_mask))?)?;

        let normed = self.encoder_attn_layer_norm.forward(&x)?;
        let x = (&x + self.encoder_attn.forward(&normed, encoder_out, None)?)?;

        let normed = self.final_layer_norm.forward(&x)?;
        &x + self.ffn.forward(&normed)?
    }
}

struct Decoder {
    embed_tokens: Embedding,
    embed_positions: Tensor,
    embed_scale: f64,
    first_position: usize,
    layers: Vec<DecoderLayer>,
    layer_norm: LayerNorm,
}

impl Decoder {
    fn new(config: &NllbConfig, shared: Embedding, vb: VarBuilder) -> CandleResult<Self> {
        let layers = (0..config.decoder_layers)
            .map(|i| DecoderLayer::new(config, vb.pp(format!("layers.{i}"))))
            .collect::<CandleResult<Vec<_>>>()?;

        Ok(Self {
            embed_tokens: shared,
            embed_positions: sinusoidal_positions(
                config.num_positions(),
                config.d_model,
                config.pad_token_id as usize,
                vb.device(),
            )?,
            embed_scale: config.embed_scale(),
            first_position: config.pad_token_id as usize + 1,
            layers,
            layer_norm: layer_norm(config.d_model, 1e-5, vb.pp("layer_norm"))?,
        })
    }

    fn forward(&self, input_ids: &Tensor, encoder_out: &Tensor) -> CandleResult<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;

        let embeds = (self.embed_tokens.forward(input_ids)? * self.embed_scale)?;
        let positions = position_embeddings(&self.embed_positions, self.first_position, seq_len)?;
        let mut hidden = embeds.broadcast_add(&positions)?;

        let causal_mask = causal_mask(seq_len, input_ids.device())?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden, encoder_out, &causal_mask)?;
        }

        self.layer_norm.forward(&hidden)
    }
}

fn causal_mask(seq_len: usize, device: &Device) -> CandleResult<Tensor> {
    let mask: Vec<f32> = (0..seq_len)
        .flat_map(|i| (0..seq_len).map(move |j| if j > i { f32::NEG_INFINITY } else { 0.0 }))
        .collect();
    Tensor::from_vec(mask, (1, 1, seq_len, seq_len), device)
}

// ========================================================================
// Full Model
// ========================================================================

/// Loaded NLLB weights on one device
pub struct NllbModel {
    encoder: Encoder,
    decoder: Decoder,
    lm_head: Linear,
    device: Device,
}

impl NllbModel {
    pub fn new(config: &NllbConfig, vb: VarBuilder) -> CandleResult<Self> {
        let shared = embedding(config.vocab_size, config.d_model, vb.pp("model.shared"))?;

        let lm_head = if vb.contains_tensor("lm_head.weight") {
            linear_no_bias(config.d_model, config.vocab_size, vb.pp("lm_head"))?
        } else {
            Linear::new(shared.embeddings().clone(), None)
        };

        Ok(Self {
            encoder: Encoder::new(config, shared.clone(), vb.pp("model.encoder"))?,
            decoder: Decoder::new(config, shared, vb.pp("model.decoder"))?,
            lm_head,
            device: vb.device().clone(),
        })
    }

    /// Run the encoder over one source sequence
    pub fn encode(&self, input_ids: &[u32]) -> CandleResult<Tensor> {
        let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
        self.encoder.forward(&input)
    }

    /// Logits for the token following `decoder_ids`
    pub fn next_token_logits(&self, decoder_ids: &[u32], encoder_out: &Tensor) -> CandleResult<Vec<f32>> {
        let input = Tensor::new(decoder_ids, &self.device)?.unsqueeze(0)?;
        let hidden = self.decoder.forward(&input, encoder_out)?;
        let last = hidden.i((.., decoder_ids.len() - 1, ..))?;

        self.lm_head
            .forward(&last)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()
    }
}
