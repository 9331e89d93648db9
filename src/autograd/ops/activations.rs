//! Numerically stable activation helpers shared by fused ops

use ndarray::Array1;

/// Softmax with max subtraction for stability
pub(crate) fn softmax_stable(x: &Array1<f32>) -> Array1<f32> {
    let max_val = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp_vals = x.mapv(|v| (v - max_val).exp());
    let sum_exp = exp_vals.sum();
    exp_vals / sum_exp
}

/// Numerically stable sigmoid: σ(x) = 1 / (1 + exp(-x))
pub(crate) fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
