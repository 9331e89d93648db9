//! Frozen line-embedding boundary
//!
//! The embedding extractor is an external collaborator: given one line's
//! fixed-length token-id sequence it returns one fixed-dimension vector, and
//! it never receives gradient updates. That contract is enforced by
//! construction here: encoders return plain arrays, not graph tensors, so
//! no backward path can reach them.

use crate::data::PAD_ID;
use ndarray::Array1;

/// A frozen per-line embedding extractor.
pub trait LineEncoder {
    /// Dimension of the produced vectors
    fn dim(&self) -> usize;

    /// Embed one line's token-id sequence into a fixed-size vector
    fn encode(&self, token_ids: &[u32]) -> Array1<f32>;
}

/// Deterministic feature-hashing encoder.
///
/// Each non-padding token id maps to a bucket and a sign; the embedding is
/// the L2-normalized signed bucket histogram. This stands in for a pretrained
/// transformer encoder: same shape of contract, no model weights to load.
pub struct HashingEncoder {
    dim: usize,
}

impl HashingEncoder {
    /// Create an encoder producing `dim`-dimensional vectors
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "embedding dimension must be positive");
        Self { dim }
    }

    /// splitmix64 bit mixer, so consecutive ids land in unrelated buckets
    fn mix(id: u32) -> u64 {
        let mut z = u64::from(id).wrapping_add(0x9e37_79b9_7f4a_7c15);
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

impl LineEncoder for HashingEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode(&self, token_ids: &[u32]) -> Array1<f32> {
        let mut vec = Array1::<f32>::zeros(self.dim);
        for &id in token_ids {
            if id == PAD_ID {
                continue;
            }
            let mixed = Self::mix(id);
            let bucket = (mixed % self.dim as u64) as usize;
            let sign = if mixed & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vec[bucket] += sign;
        }

        let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vec /= norm;
        }
        vec
    }
}
