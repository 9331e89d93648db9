//! Backward op trait

/// A node in the reverse-mode differentiation graph.
///
/// Each op captures clones of its input tensors and the gradient cell of its
/// output. `backward` reads the output gradient, accumulates input gradients,
/// and recurses into the inputs' own backward ops.
pub trait BackwardOp {
    /// Propagate gradients from this op's output to its inputs
    fn backward(&self);
}
