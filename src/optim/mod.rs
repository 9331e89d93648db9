//! Optimization: Adam and gradient clipping
//!
//! The encoder is frozen, so the optimizer only ever sees the attention
//! network's parameters. Steps are strictly ordered per batch; there is no
//! gradient accumulation across batches.

mod adam;
mod clip;
mod optimizer;

pub use adam::{Adam, AdamState};
pub use clip::clip_grad_norm;
pub use optimizer::Optimizer;
