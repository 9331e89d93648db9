//! Durable artifacts: the end-of-run checkpoint

mod checkpoint;

pub use checkpoint::{load_checkpoint, save_checkpoint, Checkpoint};
