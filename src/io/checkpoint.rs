//! Checkpoint persistence
//!
//! One checkpoint per run, written after the final epoch: the best epoch's
//! parameter snapshot plus the optimizer state as it stood at run end.

use crate::model::NetSnapshot;
use crate::optim::AdamState;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// End-of-run checkpoint contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Epoch whose parameters are stored
    pub epoch: usize,
    /// Deep copy of the best model's parameters
    pub model_state: NetSnapshot,
    /// Optimizer moments and step counter at run end
    pub optimizer_state: AdamState,
    /// RFC 3339 timestamp of the write
    pub saved_at: String,
}

/// Write a checkpoint as pretty JSON
pub fn save_checkpoint(checkpoint: &Checkpoint, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(checkpoint)
        .map_err(|e| Error::Serialization(format!("checkpoint serialization failed: {e}")))?;
    fs::write(path.as_ref(), json)?;
    Ok(())
}

/// Read a checkpoint back
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let json = fs::read_to_string(path.as_ref())?;
    let checkpoint = serde_json::from_str(&json)
        .map_err(|e| Error::Serialization(format!("checkpoint parse failed: {e}")))?;
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttentionNet;
    use crate::optim::{Adam, Optimizer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::NamedTempFile;

    fn make_checkpoint() -> Checkpoint {
        let mut rng = StdRng::seed_from_u64(0);
        let net = AttentionNet::new(2, 3, &mut rng);
        let mut optimizer = Adam::default_params(0.01);

        let mut params = vec![crate::Tensor::from_vec(vec![1.0], true)];
        params[0].set_grad(ndarray::arr1(&[0.5]));
        optimizer.step(&mut params);

        Checkpoint {
            epoch: 4,
            model_state: net.snapshot(),
            optimizer_state: optimizer.export_state(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_round_trip() {
        let checkpoint = make_checkpoint();
        let file = NamedTempFile::new().unwrap();

        save_checkpoint(&checkpoint, file.path()).unwrap();
        let restored = load_checkpoint(file.path()).unwrap();

        assert_eq!(restored.epoch, 4);
        assert_eq!(restored.optimizer_state.step, 1);
        assert_eq!(
            restored.model_state.params.len(),
            checkpoint.model_state.params.len()
        );
        assert_eq!(
            restored.model_state.params[0].1,
            checkpoint.model_state.params[0].1
        );
    }

    #[test]
    fn test_restored_model_is_usable() {
        let checkpoint = make_checkpoint();
        let file = NamedTempFile::new().unwrap();
        save_checkpoint(&checkpoint, file.path()).unwrap();

        let restored = load_checkpoint(file.path()).unwrap();
        let net = AttentionNet::from_snapshot(&restored.model_state).unwrap();
        let lines = vec![ndarray::Array1::zeros(2), ndarray::Array1::ones(2)];
        let (logit, scores) = net.forward(&lines);
        assert!(logit.item().is_finite());
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn test_save_to_bad_path_errors() {
        let checkpoint = make_checkpoint();
        let result = save_checkpoint(&checkpoint, "/nonexistent/dir/ckpt.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_malformed_errors() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        let err = load_checkpoint(file.path()).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
