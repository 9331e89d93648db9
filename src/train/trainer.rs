//! Epoch orchestration
//!
//! One control thread drives the run: per epoch, a training pass (forward,
//! blended loss, backward, clip, step) over shuffled fixed-size batches, then
//! a validation pass (same forward computation, uniform weights, no updates)
//! accumulating file probabilities for one epoch-level AUC. The best-AUC
//! snapshot is tracked across epochs and written to disk exactly once, after
//! the final epoch; the metrics table is rewritten after every epoch.

use super::{
    example_line_loss, is_line_eligible, roc_auc, weighted_bce_with_logits, BlendSchedule,
    ClassWeights, EpochMetrics, MetricsHistory, ModelSelector,
};
use crate::autograd::{backward, concat, mean, min_max_normalize, sigmoid, Tensor};
use crate::config::RunSpec;
use crate::data::{sequential_batches, shuffled_batches, Example};
use crate::encoder::LineEncoder;
use crate::io::{save_checkpoint, Checkpoint};
use crate::model::{AttentionNet, NetSnapshot};
use crate::optim::{clip_grad_norm, Adam, Optimizer};
use crate::{Error, Result};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Owned outcome of a completed run, threaded out of the orchestrator
#[derive(Debug)]
pub struct TrainingState {
    /// Highest validation AUC observed
    pub best_auc: f32,
    /// Epoch achieving it (last on ties)
    pub best_epoch: usize,
    /// Deep copy of the best epoch's parameters
    pub best_snapshot: Option<NetSnapshot>,
    /// Full per-epoch metrics log
    pub history: MetricsHistory,
}

/// Drives training and validation for one run
pub struct Trainer {
    spec: RunSpec,
    net: AttentionNet,
    optimizer: Adam,
    blend: BlendSchedule,
    rng: StdRng,
}

struct BatchOutcome {
    loss: Tensor,
    file_probs: Vec<f32>,
}

impl Trainer {
    /// Build a trainer from a validated run specification
    pub fn new(spec: &RunSpec) -> Result<Self> {
        spec.validate()?;
        let mut rng = StdRng::seed_from_u64(spec.training.seed);
        let net = AttentionNet::new(spec.model.embed_dim, spec.model.hidden_dim, &mut rng);
        let optimizer = Adam::default_params(spec.optimizer.lr);
        let blend = BlendSchedule::new(spec.training.blend_k);

        Ok(Self {
            spec: spec.clone(),
            net,
            optimizer,
            blend,
            rng,
        })
    }

    /// The attention network being trained
    pub fn net(&self) -> &AttentionNet {
        &self.net
    }

    /// Run the configured number of epochs and persist the artifacts.
    ///
    /// Fatal conditions propagate: an undefined validation AUC, IO failures,
    /// and non-finite losses all abort the run.
    pub fn fit(
        &mut self,
        encoder: &dyn LineEncoder,
        train: &[Example],
        valid: &[Example],
    ) -> Result<TrainingState> {
        if encoder.dim() != self.net.embed_dim() {
            return Err(Error::Config(format!(
                "encoder dimension {} does not match configured embed_dim {}",
                encoder.dim(),
                self.net.embed_dim()
            )));
        }
        if train.len() < self.spec.training.batch_size {
            return Err(Error::Data(format!(
                "training set has {} examples, smaller than one batch of {}",
                train.len(),
                self.spec.training.batch_size
            )));
        }

        std::fs::create_dir_all(&self.spec.output.model_dir)?;
        std::fs::create_dir_all(&self.spec.output.loss_dir)?;
        let metrics_path = self
            .spec
            .output
            .loss_dir
            .join(format!("{}-loss_record.csv", self.spec.release));
        let checkpoint_path = self
            .spec
            .output
            .model_dir
            .join(format!("{}-best_model.json", self.spec.release));

        // Computed once per run from the training distribution, constant
        // across epochs; validation always runs uniform.
        let train_labels: Vec<f32> = train.iter().map(|e| e.label).collect();
        let class_weights = ClassWeights::balanced(&train_labels);

        let mut selector = ModelSelector::new();
        let mut history = MetricsHistory::new();

        for epoch in 1..=self.spec.training.epochs {
            let train_loss = self.train_epoch(encoder, train, &class_weights)?;
            let (valid_loss, valid_auc) = self.validate_epoch(encoder, valid)?;

            selector.observe(epoch, valid_auc, &self.net);
            history.push(EpochMetrics {
                epoch,
                train_loss,
                valid_loss,
                valid_auc,
            });
            history.write_csv(&metrics_path)?;

            println!(
                "epoch {epoch}: train_loss={train_loss:.4} valid_loss={valid_loss:.4} \
                 valid_auc={valid_auc:.4}"
            );
        }

        let (best_auc, best_epoch, best_snapshot) = selector.into_parts();
        let snapshot = best_snapshot.as_ref().ok_or_else(|| {
            Error::Data("run finished without observing any epoch".to_string())
        })?;
        save_checkpoint(
            &Checkpoint {
                epoch: best_epoch,
                model_state: snapshot.clone(),
                optimizer_state: self.optimizer.export_state(),
                saved_at: chrono::Utc::now().to_rfc3339(),
            },
            &checkpoint_path,
        )?;

        Ok(TrainingState {
            best_auc,
            best_epoch,
            best_snapshot,
            history,
        })
    }

    fn train_epoch(
        &mut self,
        encoder: &dyn LineEncoder,
        train: &[Example],
        class_weights: &ClassWeights,
    ) -> Result<f32> {
        let batches = shuffled_batches(train, self.spec.training.batch_size, &mut self.rng);
        let mut losses = Vec::with_capacity(batches.len());

        for batch in &batches {
            let outcome = batch_loss(&self.net, encoder, batch, &self.blend, Some(class_weights));
            let mut loss = outcome.loss;
            let loss_val = loss.item();
            if !loss_val.is_finite() {
                return Err(Error::Data(format!(
                    "training loss diverged to {loss_val}"
                )));
            }

            backward(&mut loss, None);
            if let Some(max_norm) = self.spec.training.max_grad_norm {
                clip_grad_norm(self.net.params_mut(), max_norm);
            }
            self.optimizer.step(self.net.params_mut());
            self.optimizer.zero_grad(self.net.params_mut());

            losses.push(loss_val);
        }

        Ok(losses.iter().sum::<f32>() / losses.len() as f32)
    }

    fn validate_epoch(
        &mut self,
        encoder: &dyn LineEncoder,
        valid: &[Example],
    ) -> Result<(f32, f32)> {
        let mut losses = Vec::new();
        let mut probs = Vec::with_capacity(valid.len());
        let mut labels = Vec::with_capacity(valid.len());

        for batch in sequential_batches(valid, self.spec.training.batch_size) {
            let outcome = batch_loss(&self.net, encoder, &batch, &self.blend, None);
            losses.push(outcome.loss.item());
            probs.extend(outcome.file_probs);
            labels.extend(batch.iter().map(|e| e.label));
        }

        if losses.is_empty() {
            return Err(Error::Data("validation set is empty".to_string()));
        }

        let valid_loss = losses.iter().sum::<f32>() / losses.len() as f32;
        let valid_auc = roc_auc(&probs, &labels)?;
        Ok((valid_loss, valid_auc))
    }
}

/// One batch's blended loss, identical for both phases.
///
/// `class_weights` is `Some` during training and `None` during validation,
/// where the file loss runs unweighted; nothing else differs between the
/// phases' forward computation.
fn batch_loss(
    net: &AttentionNet,
    encoder: &dyn LineEncoder,
    batch: &[&Example],
    blend: &BlendSchedule,
    class_weights: Option<&ClassWeights>,
) -> BatchOutcome {
    let mut logits = Vec::with_capacity(batch.len());
    let mut line_losses = Vec::new();
    let mut eligible = 0usize;

    for example in batch {
        // Frozen encoder: plain vectors, no gradient path back to it
        let embeddings: Vec<Array1<f32>> = example
            .token_ids
            .iter()
            .map(|ids| encoder.encode(ids))
            .collect();

        let (logit, scores) = net.forward(&embeddings);
        logits.push(logit);

        if is_line_eligible(example) {
            eligible += 1;
            let normalized = min_max_normalize(&scores);
            line_losses.push(example_line_loss(&normalized, &example.line_labels));
        }
    }

    let logits = concat(&logits);
    let targets: Array1<f32> = batch.iter().map(|e| e.label).collect();
    let weights: Vec<f32> = match class_weights {
        Some(w) => batch.iter().map(|e| w.weight_for(e.label)).collect(),
        None => vec![1.0; batch.len()],
    };
    let file_loss = weighted_bce_with_logits(&logits, &targets, &weights);

    let line_loss = if line_losses.is_empty() {
        Tensor::zeros(1, false)
    } else {
        mean(&concat(&line_losses))
    };

    let k_eff = blend.effective(eligible, batch.len());
    let loss = blend.combine(&file_loss, &line_loss, k_eff);

    let file_probs: Vec<f32> = logits.data().iter().map(|&x| sigmoid(x)).collect();

    BatchOutcome { loss, file_probs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::HashingEncoder;
    use approx::assert_relative_eq;

    fn make_example(name: &str, label: f32, line_labels: Vec<f32>) -> Example {
        let lines = line_labels.len();
        Example {
            name: name.to_string(),
            token_ids: (0..lines)
                .map(|i| vec![(i + 1) as u32, (i * 7 + 3) as u32, 0, 0])
                .collect(),
            label,
            line_labels,
        }
    }

    fn make_net(embed_dim: usize) -> AttentionNet {
        let mut rng = StdRng::seed_from_u64(0);
        AttentionNet::new(embed_dim, 8, &mut rng)
    }

    #[test]
    fn test_batch_loss_all_ineligible_is_pure_file_loss() {
        // One clean file, one defective-but-unannotated: cnt = 0 and the
        // batch reduces to the file term alone.
        let net = make_net(16);
        let encoder = HashingEncoder::new(16);
        let clean = make_example("clean.java", 0.0, vec![0.0; 6]);
        let unannotated = make_example("bare.java", 1.0, vec![0.0; 6]);
        let batch = vec![&clean, &unannotated];
        let blend = BlendSchedule::new(0.2);

        let outcome = batch_loss(&net, &encoder, &batch, &blend, None);

        let logits: Vec<Tensor> = batch
            .iter()
            .map(|e| {
                let emb: Vec<Array1<f32>> =
                    e.token_ids.iter().map(|ids| encoder.encode(ids)).collect();
                net.forward(&emb).0
            })
            .collect();
        let targets: Array1<f32> = batch.iter().map(|e| e.label).collect();
        let file_only =
            weighted_bce_with_logits(&concat(&logits), &targets, &[1.0, 1.0]);

        assert_relative_eq!(outcome.loss.item(), file_only.item(), epsilon = 1e-5);
    }

    #[test]
    fn test_batch_loss_counts_eligible_examples() {
        // Annotated defective files engage the line term; k_eff > 0 shifts
        // the blended loss away from the pure file loss.
        let net = make_net(16);
        let encoder = HashingEncoder::new(16);
        let mut labels_a = vec![0.0; 10];
        labels_a[2] = 1.0;
        let annotated = make_example("hot.java", 1.0, labels_a);
        let clean = make_example("clean.java", 0.0, vec![0.0; 10]);
        let batch = vec![&annotated, &clean];

        let with_line = batch_loss(&net, &encoder, &batch, &BlendSchedule::new(0.4), None);
        let without_line = batch_loss(&net, &encoder, &batch, &BlendSchedule::new(0.0), None);

        assert!(with_line.loss.item().is_finite());
        // k_eff = 0.4 * 1/2 = 0.2 against 0.0: losses differ unless the
        // line and file terms coincide exactly, which they do not here.
        assert!((with_line.loss.item() - without_line.loss.item()).abs() > 1e-7);
    }

    #[test]
    fn test_batch_loss_probs_match_sigmoid_of_logits() {
        let net = make_net(16);
        let encoder = HashingEncoder::new(16);
        let example = make_example("one.java", 1.0, vec![0.0; 5]);
        let batch = vec![&example];

        let outcome = batch_loss(&net, &encoder, &batch, &BlendSchedule::new(0.2), None);
        assert_eq!(outcome.file_probs.len(), 1);
        assert!(outcome.file_probs[0] > 0.0 && outcome.file_probs[0] < 1.0);
    }

    #[test]
    fn test_training_weights_change_loss() {
        let net = make_net(16);
        let encoder = HashingEncoder::new(16);
        let defect = make_example("d.java", 1.0, vec![0.0; 5]);
        let clean = make_example("c.java", 0.0, vec![0.0; 5]);
        let batch = vec![&defect, &clean];
        let blend = BlendSchedule::new(0.0);

        // Imbalanced weights vs uniform
        let weights = ClassWeights::balanced(&[0.0, 0.0, 0.0, 1.0]);
        let weighted = batch_loss(&net, &encoder, &batch, &blend, Some(&weights));
        let uniform = batch_loss(&net, &encoder, &batch, &blend, None);

        assert!((weighted.loss.item() - uniform.loss.item()).abs() > 1e-7);
    }

    #[test]
    fn test_trainer_rejects_encoder_dim_mismatch() {
        let spec: RunSpec = serde_yaml::from_str(
            "release: r1\ndata:\n  train: t\n  valid: v\nmodel:\n  embed_dim: 16\n  hidden_dim: 8\n",
        )
        .unwrap();
        let mut trainer = Trainer::new(&spec).unwrap();
        let encoder = HashingEncoder::new(32);
        let examples = vec![make_example("a.java", 1.0, vec![0.0; 5])];

        let err = trainer.fit(&encoder, &examples, &examples).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_trainer_rejects_undersized_training_set() {
        let spec: RunSpec = serde_yaml::from_str(
            "release: r1\ndata:\n  train: t\n  valid: v\nmodel:\n  embed_dim: 16\n  hidden_dim: 8\ntraining:\n  batch_size: 4\n",
        )
        .unwrap();
        let mut trainer = Trainer::new(&spec).unwrap();
        let encoder = HashingEncoder::new(16);
        let examples = vec![make_example("a.java", 1.0, vec![0.0; 5])];

        let err = trainer.fit(&encoder, &examples, &examples).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }
}
