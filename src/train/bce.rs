//! Per-example weighted binary cross-entropy over file logits

use crate::autograd::{sigmoid, BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Numerically stable BCE: max(x, 0) - x*t + ln(1 + exp(-|x|))
fn stable_bce(logit: f32, target: f32) -> f32 {
    let relu = logit.max(0.0);
    let abs_x = logit.abs();
    relu - logit * target + (1.0 + (-abs_x).exp()).ln()
}

/// Binary cross-entropy with logits, weighted per example.
///
/// `loss = mean_i(w_i * bce(x_i, t_i))`, gradient
/// `∂loss/∂x_i = w_i * (σ(x_i) - t_i) / N`. Training passes class-balance
/// weights; validation passes uniform ones.
pub fn weighted_bce_with_logits(
    logits: &Tensor,
    targets: &Array1<f32>,
    weights: &[f32],
) -> Tensor {
    assert_eq!(logits.len(), targets.len(), "logits and targets must match");
    assert_eq!(logits.len(), weights.len(), "weights must match logits");

    let n = logits.len() as f32;
    let data = logits.data();

    let total: f32 = data
        .iter()
        .zip(targets.iter())
        .zip(weights.iter())
        .map(|((&x, &t), &w)| w * stable_bce(x, t))
        .sum::<f32>()
        / n;

    let grad: Array1<f32> = data
        .iter()
        .zip(targets.iter())
        .zip(weights.iter())
        .map(|((&x, &t), &w)| w * (sigmoid(x) - t) / n)
        .collect();
    drop(data);

    let mut loss = Tensor::from_vec(vec![total], logits.requires_grad());

    if logits.requires_grad() {
        loss.set_backward_op(Rc::new(BceBackward {
            logits: logits.clone(),
            grad,
            result_grad: loss.grad_cell(),
        }));
    }

    loss
}

struct BceBackward {
    logits: Tensor,
    grad: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for BceBackward {
    fn backward(&self) {
        if let Some(grad_out) = self.result_grad.borrow().as_ref() {
            self.logits.accumulate_grad(&self.grad * grad_out[0]);

            if let Some(op) = self.logits.backward_op() {
                op.backward();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn test_uniform_weights_match_plain_bce() {
        let logits = Tensor::from_vec(vec![0.0; 4], true);
        let targets = arr1(&[0.0, 0.0, 0.0, 0.0]);
        let loss = weighted_bce_with_logits(&logits, &targets, &[1.0; 4]);

        // ln(1 + exp(0)) = ln 2 per element
        assert_relative_eq!(loss.item(), 2.0f32.ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_confident_correct_prediction_near_zero() {
        let logits = Tensor::from_vec(vec![100.0, -100.0], true);
        let targets = arr1(&[1.0, 0.0]);
        let loss = weighted_bce_with_logits(&logits, &targets, &[1.0, 1.0]);
        assert!(loss.item() < 0.01);
    }

    #[test]
    fn test_confident_wrong_prediction_large() {
        let logits = Tensor::from_vec(vec![-100.0, 100.0], true);
        let targets = arr1(&[1.0, 0.0]);
        let loss = weighted_bce_with_logits(&logits, &targets, &[1.0, 1.0]);
        assert!(loss.item() > 10.0);
    }

    #[test]
    fn test_weights_scale_per_example() {
        let logits = Tensor::from_vec(vec![0.5, 0.5], true);
        let targets = arr1(&[1.0, 1.0]);

        let unweighted = weighted_bce_with_logits(&logits, &targets, &[1.0, 1.0]);
        let weighted = weighted_bce_with_logits(&logits, &targets, &[2.0, 2.0]);
        assert_relative_eq!(weighted.item(), 2.0 * unweighted.item(), epsilon = 1e-5);
    }

    #[test]
    fn test_gradient_direction() {
        let logits = Tensor::from_vec(vec![2.0, -1.0], true);
        let targets = arr1(&[1.0, 0.0]);
        let mut loss = weighted_bce_with_logits(&logits, &targets, &[1.0, 1.0]);
        backward(&mut loss, None);

        let grad = logits.grad().unwrap();
        // target=1, positive logit: push higher (negative gradient)
        assert!(grad[0] < 0.0);
        // target=0, negative logit: push lower (positive gradient)
        assert!(grad[1] > 0.0);
    }

    #[test]
    fn test_gradient_at_zero_logit() {
        let logits = Tensor::from_vec(vec![0.0], true);
        let targets = arr1(&[1.0]);
        let mut loss = weighted_bce_with_logits(&logits, &targets, &[1.0]);
        backward(&mut loss, None);

        // (σ(0) - 1) / 1 = -0.5
        assert_relative_eq!(logits.grad().unwrap()[0], -0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_weighted_gradient_scales() {
        let logits = Tensor::from_vec(vec![0.0], true);
        let targets = arr1(&[1.0]);
        let mut loss = weighted_bce_with_logits(&logits, &targets, &[3.0]);
        backward(&mut loss, None);

        assert_relative_eq!(logits.grad().unwrap()[0], -1.5, epsilon = 1e-5);
    }

    #[test]
    fn test_stability_extreme_logits() {
        let logits = Tensor::from_vec(vec![1000.0, -1000.0], true);
        let targets = arr1(&[1.0, 0.0]);
        let loss = weighted_bce_with_logits(&logits, &targets, &[1.0, 1.0]);
        assert!(loss.item().is_finite());
        assert!(loss.item() < 0.01);
    }

    #[test]
    #[should_panic(expected = "must match")]
    fn test_mismatched_lengths_panic() {
        let logits = Tensor::from_vec(vec![1.0, 2.0], true);
        let targets = arr1(&[1.0]);
        weighted_bce_with_logits(&logits, &targets, &[1.0, 1.0]);
    }
}
