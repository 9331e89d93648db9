//! The attention network
//!
//! Contract (the rest of the crate depends only on this): given one example's
//! ordered per-line embedding vectors, produce a file-level logit and one raw
//! attention score per line, fully differentiably. The architecture behind
//! the contract is replaceable.

mod net;

pub use net::{AttentionNet, NetSnapshot};
