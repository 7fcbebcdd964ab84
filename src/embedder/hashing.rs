//! Offline feature-hashing embedder.

use anyhow::Result;

use super::Embedder;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic bag-of-words embedder that needs no network or model files.
///
/// Tokens are lowercased alphanumeric runs of at least two characters. Each
/// token is hashed with FNV-1a; the low bits pick a dimension and the top
/// bit picks the sign. The result is L2 normalised, so dot products are
/// cosine similarities.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model: String,
}

impl HashingEmbedder {
    /// Builds a hashing embedder with the given output width.
    pub fn new(dimensions: usize) -> Result<Self> {
        anyhow::ensure!(dimensions > 0, "hashing dimensions must be positive");
        Ok(Self {
            dimensions,
            model: format!("feature-hashing-{dimensions}"),
        })
    }

    /// Output width.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Embedder for HashingEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for token in lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| token.chars().count() >= 2)
        {
            let hash = fnv1a(token.as_bytes());
            let idx = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
