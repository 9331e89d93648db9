//! Tape-based autograd engine
//!
//! Automatic differentiation over a computational graph of backward ops.
//! Forward functions build the graph; calling [`backward`] on a scalar loss
//! walks it in reverse, accumulating gradients into leaf tensors.
//!
//! Graphs are trees: every intermediate tensor is consumed by exactly one
//! downstream op. Operations whose output depends on an input through more
//! than one path (softmax-weighted pooling, the rank divergence) are fused
//! into a single op with a hand-derived backward pass.

mod backward;
mod ops;
mod tensor;


pub use backward::BackwardOp;
pub(crate) use ops::{sigmoid, softmax_stable};
pub use ops::{add, concat, mean, min_max_normalize, scale, take_top_k};
pub use tensor::Tensor;

/// Perform backward pass on a tensor
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        // Initialize with ones for scalar loss
        let ones = ndarray::Array1::ones(tensor.len());
        tensor.set_grad(ones);
    }

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}
