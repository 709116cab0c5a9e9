//! Embedding backends.
//!
//! The retrieval engine consumes embeddings through a trait so tests can
//! substitute deterministic vectors. The production backend runs a
//! BERT-family sentence encoder locally through candle, with weights
//! fetched from the HuggingFace hub on first use.

use anyhow::Context;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;

use crate::errors::{DiagnosisError, Result};

/// Default sentence encoder, 768-dimensional Chinese text vectors
pub const DEFAULT_EMBEDDING_MODEL: &str = "shibing624/text2vec-base-chinese";

const EMBEDDING_DIM: usize = 768;

/// External vector function consumed by the retrieval engine
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts, one vector per text, in input order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| DiagnosisError::Embedding("backend returned an empty batch".into()))
    }
}

/// BERT-family embedder over candle
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEmbedder {
    /// Load a model from the HuggingFace hub (cached after first download)
    pub fn new(model_id: &str) -> Result<Self> {
        Ok(Self::load(model_id)?)
    }

    fn load(model_id: &str) -> anyhow::Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().context("failed to create HuggingFace hub client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .context("failed to fetch model config")?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("failed to fetch tokenizer")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("failed to fetch model weights")?;

        let config: Config = serde_json::from_str(
            &std::fs::read_to_string(config_path).context("failed to read model config")?,
        )
        .context("failed to parse model config")?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .context("failed to map model weights")?
        };
        let model = BertModel::load(vb, &config).context("failed to build BERT model")?;

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    pub fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn forward_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let batch_size = texts.len();
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Pad every sequence to the longest in the batch
        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            flat_ids[row * max_len..row * max_len + ids.len()].copy_from_slice(ids);
            flat_mask[row * max_len..row * max_len + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)?;

        let hidden = self.model.forward(&token_ids, &attention_mask, None)?;
        let pooled = mean_pool(&hidden, &attention_mask)?;

        Ok(pooled.to_vec2::<f32>()?)
    }
}

impl EmbeddingBackend for BertEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.forward_batch(texts)?)
    }
}

/// Attention-masked mean pooling over the sequence dimension
fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> anyhow::Result<Tensor> {
    let mask = attention_mask
        .unsqueeze(2)?
        .expand(hidden.shape())?
        .to_dtype(hidden.dtype())?;

    let summed = (hidden * &mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;

    Ok(summed.broadcast_div(&counts)?)
}
