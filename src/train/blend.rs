//! Adaptive blend of file and line losses

use crate::autograd::{add, scale, Tensor};

/// Per-batch convex blend of the file-classification and line-ranking
/// losses.
///
/// The configured `k` is a ceiling: the line term's actual share is
/// `k_eff = k * (eligible / batch_len)`, so batches with little or no line
/// supervision lean on the file loss instead of amplifying a noisy or empty
/// line term.
#[derive(Debug, Clone, Copy)]
pub struct BlendSchedule {
    k: f32,
}

impl BlendSchedule {
    /// Create a schedule with blend ceiling `k` (from run configuration)
    pub fn new(k: f32) -> Self {
        debug_assert!((0.0..=1.0).contains(&k), "blend k must lie in [0, 1]");
        Self { k }
    }

    /// Effective blend coefficient for a batch
    pub fn effective(&self, eligible: usize, batch_len: usize) -> f32 {
        debug_assert!(eligible <= batch_len);
        self.k * (eligible as f32 / batch_len as f32)
    }

    /// `(1 - k_eff) * file_loss + k_eff * line_loss`
    pub fn combine(&self, file_loss: &Tensor, line_loss: &Tensor, k_eff: f32) -> Tensor {
        add(
            &scale(file_loss, 1.0 - k_eff),
            &scale(line_loss, k_eff),
        )
    }
}
