//! Epoch metrics: ROC AUC and the persisted per-epoch table

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Area under the ROC curve via the rank statistic, with tie-averaged ranks.
///
/// Errors when only one class is present: an undefined AUC must surface
/// rather than masquerade as a default score, or model selection would pick
/// garbage.
pub fn roc_auc(probs: &[f32], labels: &[f32]) -> Result<f32> {
    assert_eq!(probs.len(), labels.len(), "probs and labels must match");

    let positives = labels.iter().filter(|&&l| l == 1.0).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(Error::UndefinedAuc(format!(
            "{positives} positive and {negatives} negative examples in validation set"
        )));
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&i, &j| probs[i].total_cmp(&probs[j]));

    // Average ranks across tied scores
    let mut ranks = vec![0.0f64; probs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(ranks.iter())
        .filter(|(&l, _)| l == 1.0)
        .map(|(_, &r)| r)
        .sum();

    let n_pos = positives as f64;
    let n_neg = negatives as f64;
    let auc = (positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg);
    Ok(auc as f32)
}

/// One row of the per-epoch metrics table
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch index
    pub epoch: usize,
    /// Mean training loss over the epoch's batches
    pub train_loss: f32,
    /// Mean validation loss over the epoch's batches
    pub valid_loss: f32,
    /// Epoch-level validation AUC
    pub valid_auc: f32,
}

/// Monotonically growing per-epoch metrics log.
///
/// The full table is rewritten to disk after every epoch; rows are never
/// truncated or amended.
#[derive(Debug, Default)]
pub struct MetricsHistory {
    rows: Vec<EpochMetrics>,
}

impl MetricsHistory {
    /// Empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one epoch's row
    pub fn push(&mut self, row: EpochMetrics) {
        self.rows.push(row);
    }

    /// All rows recorded so far
    pub fn rows(&self) -> &[EpochMetrics] {
        &self.rows
    }

    /// Render the table as CSV
    pub fn to_csv_string(&self) -> String {
        let mut out = String::from("epoch,train_loss,valid_loss,valid_auc\n");
        for row in &self.rows {
            out.push_str(&format!(
                "{},{},{},{}\n",
                row.epoch, row.train_loss, row.valid_loss, row.valid_auc
            ));
        }
        out
    }

    /// Rewrite the full table to `path`
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_csv_string())?;
        Ok(())
    }
}
