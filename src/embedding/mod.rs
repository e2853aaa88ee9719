//! Embedding provider abstraction and the on-device fastembed backend.
//!
//! The pipeline and retriever consume embeddings through the
//! [`EmbeddingProvider`] trait so tests can substitute a deterministic
//! implementation. The real backend runs entirely on-device via ONNX
//! Runtime and is feature-gated behind `embedding` — disable with
//! `--no-default-features` for environments without ONNX.

use crate::error::{KnowledgeError, Result};

// ---------------------------------------------------------------------------
// EmbeddingProvider
// ---------------------------------------------------------------------------

/// Batched text-to-vector function with a declared dimension.
///
/// `initialize` is idempotent: the model loads at most once, and a probe
/// embedding verifies that the produced dimension matches the declared one
/// before any chunk is embedded (mismatch is fatal).
pub trait EmbeddingProvider: Send {
    fn initialize(&mut self) -> Result<()>;

    /// Embed a batch of texts, one vector per input, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(std::slice::from_ref(&text.to_string()))?;
        vectors
            .pop()
            .ok_or_else(|| KnowledgeError::Embedding("no embedding returned".into()))
    }

    /// Release model resources. Safe to call more than once.
    fn dispose(&mut self);

    fn model_id(&self) -> &str;
    fn dimensions(&self) -> usize;
}

// ---------------------------------------------------------------------------
// Fastembed backend
// ---------------------------------------------------------------------------

/// On-device provider backed by fastembed.
///
/// The model is lazily downloaded on first use and cached in
/// `.fastembed_cache` (or `$HF_HOME`).
#[cfg(feature = "embedding")]
pub struct FastembedProvider {
    model_id: String,
    dimensions: usize,
    model: Option<fastembed::TextEmbedding>,
}

#[cfg(feature = "embedding")]
impl FastembedProvider {
    pub fn new(model_id: &str, dimensions: usize) -> Self {
        Self {
            model_id: model_id.to_string(),
            dimensions,
            model: None,
        }
    }

    /// Map a configured model identifier onto a fastembed model.
    fn resolve_model(model_id: &str) -> Result<fastembed::EmbeddingModel> {
        use fastembed::EmbeddingModel;
        match model_id {
            "Xenova/all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
                Ok(EmbeddingModel::AllMiniLML6V2)
            }
            "BAAI/bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
            "jinaai/jina-embeddings-v2-base-code" => Ok(EmbeddingModel::JinaEmbeddingsV2BaseCode),
            other => Err(KnowledgeError::Embedding(format!(
                "unsupported embedding model: {other}"
            ))),
        }
    }

    fn model(&self) -> Result<&fastembed::TextEmbedding> {
        self.model
            .as_ref()
            .ok_or_else(|| KnowledgeError::Embedding("provider not initialized".into()))
    }
}

#[cfg(feature = "embedding")]
impl EmbeddingProvider for FastembedProvider {
    fn initialize(&mut self) -> Result<()> {
        if self.model.is_some() {
            return Ok(());
        }

        let model_kind = Self::resolve_model(&self.model_id)?;
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(model_kind).with_show_download_progress(false),
        )
        .map_err(|e| KnowledgeError::Embedding(e.to_string()))?;

        // One-shot probe: the declared dimension must match what the model
        // actually produces.
        let probe = model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| KnowledgeError::Embedding(e.to_string()))?;
        let actual = probe.first().map(Vec::len).unwrap_or(0);
        if actual != self.dimensions {
            return Err(KnowledgeError::DimensionMismatch {
                expected: self.dimensions,
                actual,
            });
        }

        self.model = Some(model);
        Ok(())
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.model()?
            .embed(refs, None)
            .map_err(|e| KnowledgeError::Embedding(e.to_string()))
    }

    fn dispose(&mut self) {
        self.model = None;
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Construct the configured provider.
#[cfg(feature = "embedding")]
pub fn provider_from_config(model_id: &str, dimensions: usize) -> Result<Box<dyn EmbeddingProvider>> {
    Ok(Box::new(FastembedProvider::new(model_id, dimensions)))
}

#[cfg(not(feature = "embedding"))]
pub fn provider_from_config(
    _model_id: &str,
    _dimensions: usize,
) -> Result<Box<dyn EmbeddingProvider>> {
    Err(KnowledgeError::Embedding(
        "embedding support not compiled; rebuild with `--features embedding`".into(),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Deterministic hash-based provider for tests: no model download, stable
    /// output, tunable dimension.
    pub struct HashProvider {
        pub dims: usize,
        pub initialized: bool,
    }

    impl HashProvider {
        pub fn new(dims: usize) -> Self {
            Self {
                dims,
                initialized: false,
            }
        }
    }

    impl EmbeddingProvider for HashProvider {
        fn initialize(&mut self) -> Result<()> {
            self.initialized = true;
            Ok(())
        }

        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut vector = vec![0.0f32; self.dims];
                    for (i, byte) in text.bytes().enumerate() {
                        vector[i % self.dims] += byte as f32 / 255.0;
                    }
                    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
                    if norm > 0.0 {
                        for v in &mut vector {
                            *v /= norm;
                        }
                    }
                    vector
                })
                .collect())
        }

        fn dispose(&mut self) {
            self.initialized = false;
        }

        fn model_id(&self) -> &str {
            "test/hash-provider"
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }
}
