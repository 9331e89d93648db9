//! Best-model tracking across epochs

use crate::model::{AttentionNet, NetSnapshot};

/// Tracks the best validation AUC seen so far and a deep copy of the
/// corresponding parameter state.
///
/// Acceptance is `>=`, so ties resolve to the later epoch. The snapshot is a
/// copy, never a reference, so later training cannot mutate it.
#[derive(Debug, Default)]
pub struct ModelSelector {
    best_auc: f32,
    best_epoch: usize,
    best_snapshot: Option<NetSnapshot>,
}

impl ModelSelector {
    /// Start with `(0, 0, none)`
    pub fn new() -> Self {
        Self::default()
    }

    /// Consider one epoch's validation AUC
    pub fn observe(&mut self, epoch: usize, valid_auc: f32, net: &AttentionNet) {
        if valid_auc >= self.best_auc {
            self.best_auc = valid_auc;
            self.best_epoch = epoch;
            self.best_snapshot = Some(net.snapshot());
        }
    }

    /// Best AUC so far
    pub fn best_auc(&self) -> f32 {
        self.best_auc
    }

    /// Epoch achieving the best AUC (last on ties)
    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    /// Snapshot of the best parameters, if any epoch was observed
    pub fn best_snapshot(&self) -> Option<&NetSnapshot> {
        self.best_snapshot.as_ref()
    }

    /// Give up ownership of the tracked state
    pub fn into_parts(self) -> (f32, usize, Option<NetSnapshot>) {
        (self.best_auc, self.best_epoch, self.best_snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_net() -> AttentionNet {
        let mut rng = StdRng::seed_from_u64(0);
        AttentionNet::new(2, 3, &mut rng)
    }

    #[test]
    fn test_initial_state() {
        let selector = ModelSelector::new();
        assert_eq!(selector.best_auc(), 0.0);
        assert_eq!(selector.best_epoch(), 0);
        assert!(selector.best_snapshot().is_none());
    }

    #[test]
    fn test_first_observation_accepted() {
        let net = make_net();
        let mut selector = ModelSelector::new();
        selector.observe(1, 0.6, &net);

        assert_eq!(selector.best_epoch(), 1);
        assert!(selector.best_snapshot().is_some());
    }

    #[test]
    fn test_tie_resolves_to_later_epoch() {
        // AUC sequence [0.6, 0.6, 0.55, 0.7]
        let net = make_net();
        let mut selector = ModelSelector::new();

        selector.observe(1, 0.6, &net);
        selector.observe(2, 0.6, &net);
        assert_eq!(selector.best_epoch(), 2);

        selector.observe(3, 0.55, &net);
        assert_eq!(selector.best_epoch(), 2);

        selector.observe(4, 0.7, &net);
        assert_eq!(selector.best_epoch(), 4);
        assert_eq!(selector.best_auc(), 0.7);
    }

    #[test]
    fn test_best_is_max_over_sequence() {
        let net = make_net();
        let mut selector = ModelSelector::new();
        let aucs = [0.5, 0.8, 0.3, 0.79, 0.8];
        for (i, &auc) in aucs.iter().enumerate() {
            selector.observe(i + 1, auc, &net);
        }
        assert_eq!(selector.best_auc(), 0.8);
        // Last epoch achieving the max wins
        assert_eq!(selector.best_epoch(), 5);
    }

    #[test]
    fn test_snapshot_frozen_against_later_training() {
        let net = make_net();
        let mut selector = ModelSelector::new();
        selector.observe(1, 0.9, &net);

        let before = selector.best_snapshot().unwrap().params[0].1.clone();
        net.params()[0].data_mut()[0] += 50.0;
        let after = selector.best_snapshot().unwrap().params[0].1.clone();
        assert_eq!(before, after);
    }

    #[test]
    fn test_into_parts() {
        let net = make_net();
        let mut selector = ModelSelector::new();
        selector.observe(3, 0.72, &net);

        let (auc, epoch, snapshot) = selector.into_parts();
        assert_eq!(auc, 0.72);
        assert_eq!(epoch, 3);
        assert!(snapshot.is_some());
    }
}
