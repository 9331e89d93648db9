//! Selection and normalization ops for attention vectors

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Min–max normalize a vector into [0, 1].
///
/// When `max == min` the division is undefined (0/0); the vector degenerates
/// to a constant 0.5 (uniform attention over all lines) and no gradient
/// flows, rather than letting NaN poison the loss.
pub fn min_max_normalize(a: &Tensor) -> Tensor {
    let data = a.data();
    let mut arg_min = 0usize;
    let mut arg_max = 0usize;
    for (i, &v) in data.iter().enumerate() {
        if v < data[arg_min] {
            arg_min = i;
        }
        if v > data[arg_max] {
            arg_max = i;
        }
    }
    let min = data[arg_min];
    let max = data[arg_max];
    let range = max - min;

    if range == 0.0 {
        drop(data);
        return Tensor::new(Array1::from(vec![0.5; a.len()]), false);
    }

    let normalized = data.mapv(|v| (v - min) / range);
    drop(data);

    let requires_grad = a.requires_grad();
    let mut result = Tensor::new(normalized.clone(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MinMaxBackward {
            a: a.clone(),
            normalized,
            range,
            arg_min,
            arg_max,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MinMaxBackward {
    a: Tensor,
    normalized: Array1<f32>,
    range: f32,
    arg_min: usize,
    arg_max: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MinMaxBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // y_i = (x_i - x_min) / (x_max - x_min)
                // ∂L/∂x_j = g_j/r - [j==argmin]*Σg/r - ([j==argmax]-[j==argmin])*Σ(g·y)/r
                let sum_g: f32 = grad.sum();
                let sum_gy: f32 = (grad * &self.normalized).sum();

                let mut grad_a = grad / self.range;
                grad_a[self.arg_min] -= sum_g / self.range;
                grad_a[self.arg_max] -= sum_gy / self.range;
                grad_a[self.arg_min] += sum_gy / self.range;

                self.a.accumulate_grad(grad_a);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// Restrict a vector to its `k` largest entries.
///
/// Sort is descending and stable: ties keep their original index order.
/// Returns the restricted tensor plus the chosen original indices, so the
/// caller can index a parallel label vector by the same ranking. `k == 0`
/// yields an empty tensor and no gradient path.
pub fn take_top_k(a: &Tensor, k: usize) -> (Tensor, Vec<usize>) {
    let data = a.data();
    let mut order: Vec<usize> = (0..data.len()).collect();
    order.sort_by(|&i, &j| data[j].total_cmp(&data[i]));
    order.truncate(k);

    let selected: Vec<f32> = order.iter().map(|&i| data[i]).collect();
    drop(data);

    let requires_grad = a.requires_grad() && k > 0;
    let mut result = Tensor::new(Array1::from(selected), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(TopKBackward {
            a: a.clone(),
            indices: order.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    (result, order)
}

struct TopKBackward {
    a: Tensor,
    indices: Vec<usize>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for TopKBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let mut grad_a = Array1::zeros(self.a.len());
                for (pos, &idx) in self.indices.iter().enumerate() {
                    grad_a[idx] = grad[pos];
                }
                self.a.accumulate_grad(grad_a);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}
