//! Text embeddings

use crate::llm::{ModelService, ServiceError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Dimension `text-embedding-004` produces
pub const EXPECTED_DIMENSION: usize = 768;

/// Number of leading values shown by default
pub const PREVIEW_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Text to embed must not be empty")]
    EmptyInput,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// A generated embedding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embedding {
    pub text: String,
    pub values: Vec<f32>,
    pub generated_at: DateTime<Utc>,
}

/// Summary statistics over an embedding's values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmbeddingStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// Euclidean length
    pub norm: f32,
}

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// First `n` values (fewer if the vector is shorter)
    pub fn preview(&self, n: usize) -> &[f32] {
        &self.values[..n.min(self.values.len())]
    }

    /// `None` for an empty vector
    pub fn stats(&self) -> Option<EmbeddingStats> {
        if self.values.is_empty() {
            return None;
        }
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0_f64;
        let mut sum_sq = 0.0_f64;
        for &v in &self.values {
            min = min.min(v);
            max = max.max(v);
            sum += f64::from(v);
            sum_sq += f64::from(v) * f64::from(v);
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let mean = (sum / self.values.len() as f64) as f32;
        #[allow(clippy::cast_possible_truncation)]
        let norm = sum_sq.sqrt() as f32;
        Some(EmbeddingStats {
            min,
            max,
            mean,
            norm,
        })
    }
}

/// Embed `text` with a single service call
///
/// No chunking: long text is sent as-is and the service decides.
pub async fn generate_embedding<S>(service: &S, text: &str) -> Result<Embedding, EmbeddingError>
where
    S: ModelService + ?Sized,
{
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }

    let values = service.embed(text).await?;
    if values.len() != EXPECTED_DIMENSION {
        tracing::warn!(
            dimension = values.len(),
            expected = EXPECTED_DIMENSION,
            model = %service.model_id(),
            "Unexpected embedding dimension"
        );
    }

    Ok(Embedding {
        text: text.to_string(),
        values,
        generated_at: Utc::now(),
    })
}

/// Cosine similarity in `[-1, 1]`
///
/// `None` when the dimensions differ or either vector has zero length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32;
    Some(similarity)
}
