//! Basic autograd operations: add, scale, mean, concat

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Add two tensors element-wise
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    let data = &*a.data() + &*b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
            if let Some(op) = self.b.backward_op() {
                op.backward();
            }
        }
    }
}

/// Scale a tensor by a scalar factor
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = &*a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * self.factor);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// Mean of all elements, as a scalar tensor
pub fn mean(a: &Tensor) -> Tensor {
    let n = a.len() as f32;
    let data = Array1::from(vec![a.data().sum() / n]);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MeanBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MeanBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MeanBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂mean/∂a_i = 1/n
                let n = self.a.len() as f32;
                let grad_a = Array1::from(vec![grad[0] / n; self.a.len()]);
                self.a.accumulate_grad(grad_a);
            }

            if let Some(op) = self.a.backward_op() {
                op.backward();
            }
        }
    }
}

/// Concatenate tensors into one, preserving order
pub fn concat(parts: &[Tensor]) -> Tensor {
    let mut data = Vec::new();
    let mut requires_grad = false;
    for part in parts {
        data.extend_from_slice(part.data().as_slice().expect("contiguous tensor data"));
        requires_grad = requires_grad || part.requires_grad();
    }

    let mut result = Tensor::new(Array1::from(data), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ConcatBackward {
            parts: parts.to_vec(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ConcatBackward {
    parts: Vec<Tensor>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ConcatBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let mut offset = 0;
            for part in &self.parts {
                let len = part.len();
                if part.requires_grad() {
                    let slice = grad.slice(ndarray::s![offset..offset + len]).to_owned();
                    part.accumulate_grad(slice);
                }
                offset += len;
            }

            for part in &self.parts {
                if let Some(op) = part.backward_op() {
                    op.backward();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;

    #[test]
    fn test_add_forward() {
        let a = Tensor::from_vec(vec![1.0, 2.0], false);
        let b = Tensor::from_vec(vec![3.0, 4.0], false);
        let c = add(&a, &b);
        assert_eq!(c.to_vec(), vec![4.0, 6.0]);
    }

    #[test]
    fn test_add_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let b = Tensor::from_vec(vec![3.0, 4.0], true);
        let mut c = add(&a, &b);
        backward(&mut c, None);

        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0, 1.0]);
        assert_eq!(b.grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_scale_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let mut c = scale(&a, 2.5);
        assert_eq!(c.to_vec(), vec![2.5, 5.0]);

        backward(&mut c, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![2.5, 2.5]);
    }

    #[test]
    fn test_mean_forward_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let mut m = mean(&a);
        assert_relative_eq!(m.item(), 2.5, epsilon = 1e-6);

        backward(&mut m, None);
        for &g in &a.grad().unwrap() {
            assert_relative_eq!(g, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_concat_forward() {
        let a = Tensor::from_vec(vec![1.0], false);
        let b = Tensor::from_vec(vec![2.0, 3.0], false);
        let c = concat(&[a, b]);
        assert_eq!(c.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_concat_backward_scatters() {
        let a = Tensor::from_vec(vec![1.0], true);
        let b = Tensor::from_vec(vec![2.0, 3.0], true);
        let cat = concat(&[a.clone(), b.clone()]);
        let mut m = mean(&cat);
        backward(&mut m, None);

        assert_relative_eq!(a.grad().unwrap()[0], 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(b.grad().unwrap()[0], 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(b.grad().unwrap()[1], 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_concat_mixed_grad() {
        let a = Tensor::from_vec(vec![1.0], true);
        let b = Tensor::from_vec(vec![2.0], false);
        let cat = concat(&[a.clone(), b.clone()]);
        let mut m = mean(&cat);
        backward(&mut m, None);

        assert!(a.grad().is_some());
        assert!(b.grad().is_none());
    }

    #[test]
    fn test_convex_combination_via_scale_add() {
        // loss = (1-k)*x + k*y
        let x = Tensor::from_vec(vec![2.0], true);
        let y = Tensor::from_vec(vec![6.0], true);
        let k = 0.25;
        let mut loss = add(&scale(&x, 1.0 - k), &scale(&y, k));

        assert_relative_eq!(loss.item(), 3.0, epsilon = 1e-6);

        backward(&mut loss, None);
        assert_relative_eq!(x.grad().unwrap()[0], 0.75, epsilon = 1e-6);
        assert_relative_eq!(y.grad().unwrap()[0], 0.25, epsilon = 1e-6);
    }
}
