//! Local ONNX Runtime embedding provider (all-MiniLM-L6-v2 via `ort`).
//!
//! Notes routinely exceed the model's window, so input is truncated to
//! [`MAX_SEQ_LEN`] tokens: the title and opening paragraphs dominate the vector.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, Tokenizer};

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

/// all-MiniLM-L6-v2 was trained at 256 tokens.
const MAX_SEQ_LEN: usize = 256;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync and the Session is only touched behind the Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

/// Paths of the model and tokenizer files inside the configured cache directory.
pub fn model_files(config: &EmbeddingConfig) -> (PathBuf, PathBuf) {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    (cache_dir.join(MODEL_FILE), cache_dir.join(TOKENIZER_FILE))
}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_path, tokenizer_path) = model_files(config);

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `notewatch model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer not found at {}. Run `notewatch model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            "local embedding model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    /// Run the encoder and return flattened token embeddings plus the sequence length
    /// the model reported.
    fn token_embeddings(&self, encodings: &[Encoding]) -> Result<(Vec<f32>, usize)> {
        let batch = encodings.len();
        let seq_len = encodings[0].get_ids().len();
        let shape = vec![batch as i64, seq_len as i64];

        let flatten = |f: fn(&Encoding) -> &[u32]| -> Vec<i64> {
            encodings
                .iter()
                .flat_map(|e| f(e).iter().map(|&v| v as i64))
                .collect()
        };
        let input_ids = Tensor::from_array((shape.clone(), flatten(Encoding::get_ids).into_boxed_slice()))?;
        let attention_mask = Tensor::from_array((
            shape.clone(),
            flatten(Encoding::get_attention_mask).into_boxed_slice(),
        ))?;
        // Single-segment input: token_type_ids are all zero.
        let token_type_ids = Tensor::from_array((shape, vec![0i64; batch * seq_len].into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("embedding session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "token_type_ids" => token_type_ids,
        })?;

        // Output naming differs between ONNX exports.
        let value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);
        let (shape, data) = value
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings")?;

        let dims: &[i64] = &shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[2] == EMBEDDING_DIM as i64,
            "unexpected token embedding shape {dims:?}, expected [batch, seq, {EMBEDDING_DIM}]"
        );
        Ok((data.to_vec(), dims[1] as usize))
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("embedding batch returned no vectors")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        let (data, seq_len) = self.token_embeddings(&encodings)?;

        Ok(encodings
            .iter()
            .enumerate()
            .map(|(b, encoding)| {
                let offset = b * seq_len * EMBEDDING_DIM;
                let rows = &data[offset..offset + seq_len * EMBEDDING_DIM];
                l2_normalize(&mean_pool(rows, encoding.get_attention_mask()))
            })
            .collect())
    }
}

/// Average token vectors whose attention mask is set.
fn mean_pool(rows: &[f32], mask: &[u32]) -> Vec<f32> {
    let mut sum = vec![0.0f32; EMBEDDING_DIM];
    let mut count = 0.0f32;
    for (token, chunk) in rows.chunks_exact(EMBEDDING_DIM).enumerate() {
        if mask.get(token).copied().unwrap_or(0) == 0 {
            continue;
        }
        for (acc, v) in sum.iter_mut().zip(chunk) {
            *acc += v;
        }
        count += 1.0;
    }
    if count > 0.0 {
        sum.iter_mut().for_each(|v| *v /= count);
    }
    sum
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
