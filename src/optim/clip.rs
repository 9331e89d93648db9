//! Gradient clipping

use crate::Tensor;

/// Clip gradients by global norm.
///
/// Computes the global norm across all parameter gradients and, when it
/// exceeds `max_norm`, scales every gradient by `max_norm / global_norm` so
/// relative magnitudes are preserved.
///
/// Returns the global norm before clipping.
pub fn clip_grad_norm(params: &mut [Tensor], max_norm: f32) -> f32 {
    let mut total_norm_sq = 0.0;
    for param in params.iter() {
        if let Some(grad) = param.grad() {
            total_norm_sq += grad.iter().map(|&g| g * g).sum::<f32>();
        }
    }

    let global_norm = total_norm_sq.sqrt();

    if global_norm > max_norm {
        let clip_coef = max_norm / global_norm;
        for param in params.iter_mut() {
            if let Some(grad) = param.grad() {
                param.set_grad(grad * clip_coef);
            }
        }
    }

    global_norm
}
