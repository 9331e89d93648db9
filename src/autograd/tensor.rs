//! Gradient-carrying tensor

use super::BackwardOp;
use ndarray::Array1;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// A rank-1 tensor with optional gradient tracking.
///
/// Cloning a `Tensor` is cheap and shares storage: clones captured by
/// backward ops accumulate gradients into the same cell the optimizer later
/// reads. Matrices are stored flattened row-major with dimensions tracked by
/// the op that owns them.
#[derive(Clone)]
pub struct Tensor {
    data: Rc<RefCell<Array1<f32>>>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    requires_grad: bool,
    backward_op: Rc<RefCell<Option<Rc<dyn BackwardOp>>>>,
}

impl Tensor {
    /// Create a tensor from an ndarray
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        Self {
            data: Rc::new(RefCell::new(data)),
            grad: Rc::new(RefCell::new(None)),
            requires_grad,
            backward_op: Rc::new(RefCell::new(None)),
        }
    }

    /// Create a tensor from a `Vec<f32>`
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a zero-filled tensor of the given length
    pub fn zeros(len: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(len), requires_grad)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// Whether the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the underlying data
    pub fn data(&self) -> Ref<'_, Array1<f32>> {
        self.data.borrow()
    }

    /// Mutably borrow the underlying data
    pub fn data_mut(&self) -> RefMut<'_, Array1<f32>> {
        self.data.borrow_mut()
    }

    /// Copy the data out as a `Vec<f32>`
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.borrow().to_vec()
    }

    /// Scalar value of a length-1 tensor
    pub fn item(&self) -> f32 {
        debug_assert_eq!(self.len(), 1, "item() requires a scalar tensor");
        self.data.borrow()[0]
    }

    /// Whether gradients are tracked for this tensor
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Current gradient, if any (cloned out)
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Shared handle to the gradient cell, for backward ops
    pub fn grad_cell(&self) -> Rc<RefCell<Option<Array1<f32>>>> {
        Rc::clone(&self.grad)
    }

    /// Overwrite the gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add into the gradient, initializing it if unset
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        if let Some(existing) = cell.as_mut() {
            *existing = &*existing + &grad;
        } else {
            *cell = Some(grad);
        }
    }

    /// Clear the gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Attach the backward op producing this tensor
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        *self.backward_op.borrow_mut() = Some(op);
    }

    /// The backward op producing this tensor, if any
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.borrow().clone()
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("data", &self.data.borrow())
            .field("requires_grad", &self.requires_grad)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_tensor_creation() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        assert_eq!(t.len(), 3);
        assert!(t.requires_grad());
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(4, false);
        assert_eq!(t.len(), 4);
        assert!(t.data().iter().all(|&v| v == 0.0));
        assert!(!t.requires_grad());
    }

    #[test]
    fn test_clone_shares_grad_storage() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        let alias = t.clone();

        alias.accumulate_grad(arr1(&[0.5, 0.5]));
        assert_eq!(t.grad().unwrap(), arr1(&[0.5, 0.5]));
    }

    #[test]
    fn test_accumulate_grad_adds() {
        let t = Tensor::from_vec(vec![0.0], true);
        t.accumulate_grad(arr1(&[1.0]));
        t.accumulate_grad(arr1(&[2.0]));
        assert_eq!(t.grad().unwrap()[0], 3.0);
    }

    #[test]
    fn test_zero_grad() {
        let t = Tensor::from_vec(vec![1.0], true);
        t.set_grad(arr1(&[5.0]));
        assert!(t.grad().is_some());
        t.zero_grad();
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_item() {
        let t = Tensor::from_vec(vec![7.5], false);
        assert_eq!(t.item(), 7.5);
    }

    #[test]
    fn test_data_mut_updates_aliases() {
        let t = Tensor::from_vec(vec![1.0, 2.0], true);
        let alias = t.clone();
        t.data_mut()[0] = 9.0;
        assert_eq!(alias.data()[0], 9.0);
    }
}
