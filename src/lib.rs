//! # culpar
//!
//! Trains a line-level defect prediction model. Each training example is one
//! source file split into lines; the model jointly predicts whether the file
//! is defective and which lines are most likely responsible, supervised by
//! file-level labels plus sparse, partially available line-level labels.
//!
//! The training loss is hierarchical: a class-weighted binary cross-entropy
//! over the file logit, blended with a rank-discounted divergence between the
//! model's per-line attention distribution and the annotated defect lines.
//! The blend coefficient adapts per batch to the fraction of examples that
//! actually carry usable line supervision.
//!
//! # Example
//!
//! ```no_run
//! use culpar::config::RunSpec;
//! use culpar::data::load_release;
//! use culpar::encoder::HashingEncoder;
//! use culpar::train::Trainer;
//!
//! # fn main() -> culpar::Result<()> {
//! let spec = RunSpec::from_yaml_file("run.yaml")?;
//! let train = load_release(&spec.data.train, &spec.data)?;
//! let valid = load_release(&spec.data.valid, &spec.data)?;
//!
//! let encoder = HashingEncoder::new(spec.model.embed_dim);
//! let mut trainer = Trainer::new(&spec)?;
//! let state = trainer.fit(&encoder, &train, &valid)?;
//! println!("best AUC {:.4} at epoch {}", state.best_auc, state.best_epoch);
//! # Ok(())
//! # }
//! ```

pub mod autograd;
pub mod cli;
pub mod config;
pub mod data;
pub mod encoder;
mod error;
pub mod io;
pub mod model;
pub mod optim;
pub mod train;

pub use autograd::Tensor;
pub use error::{Error, Result};
