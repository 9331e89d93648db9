//! Dataset releases and batching
//!
//! A release is a JSON-lines file with one record per source file. Records
//! carry the file's lines, the binary file label, and an optional per-line
//! label vector (absent means no line-level annotation exists). Files keep
//! their own variable line counts; batches never pad across files.

mod example;
mod release;
mod tokenize;

pub use example::{sequential_batches, shuffled_batches, Example};
pub use release::{load_release, FileRecord};
pub use tokenize::{tokenize_line, PAD_ID};
