//! Additive-attention line scorer with a file-level classification head
//!
//! Each line embedding is projected through a shared tanh layer; an additive
//! attention vector scores every projected line, and the softmax-attended
//! fusion of the projections feeds the file logit. The whole forward pass for
//! one example is a single fused autograd op per output with a hand-derived
//! backward pass.

use crate::autograd::{softmax_stable, BackwardOp, Tensor};
use crate::{Error, Result};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

const PARAM_NAMES: [&str; 5] = ["w_proj", "b_proj", "v_att", "w_out", "b_out"];

/// Attention network over per-line embeddings
pub struct AttentionNet {
    embed_dim: usize,
    hidden_dim: usize,
    w_proj: Tensor,
    b_proj: Tensor,
    v_att: Tensor,
    w_out: Tensor,
    b_out: Tensor,
    params: Vec<Tensor>,
}

/// Deep copy of the network's learnable parameter state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetSnapshot {
    /// Line embedding dimension
    pub embed_dim: usize,
    /// Hidden projection dimension
    pub hidden_dim: usize,
    /// Named parameter values
    pub params: Vec<(String, Vec<f32>)>,
}

impl AttentionNet {
    /// Create a network with Xavier-uniform initialized weights
    pub fn new(embed_dim: usize, hidden_dim: usize, rng: &mut StdRng) -> Self {
        let proj_bound = (6.0 / (embed_dim + hidden_dim) as f32).sqrt();
        let head_bound = (6.0 / (hidden_dim + 1) as f32).sqrt();

        let mut uniform = |n: usize, bound: f32| -> Tensor {
            let values: Vec<f32> = (0..n).map(|_| rng.gen_range(-bound..bound)).collect();
            Tensor::from_vec(values, true)
        };

        let w_proj = uniform(hidden_dim * embed_dim, proj_bound);
        let v_att = uniform(hidden_dim, head_bound);
        let w_out = uniform(hidden_dim, head_bound);
        let b_proj = Tensor::zeros(hidden_dim, true);
        let b_out = Tensor::zeros(1, true);

        let params = vec![
            w_proj.clone(),
            b_proj.clone(),
            v_att.clone(),
            w_out.clone(),
            b_out.clone(),
        ];

        Self {
            embed_dim,
            hidden_dim,
            w_proj,
            b_proj,
            v_att,
            w_out,
            b_out,
            params,
        }
    }

    /// Line embedding dimension this network expects
    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    /// Learnable parameters, shared with the network's own handles
    pub fn params(&self) -> &[Tensor] {
        &self.params
    }

    /// Mutable view of the learnable parameters, for the optimizer
    pub fn params_mut(&mut self) -> &mut [Tensor] {
        &mut self.params
    }

    /// Forward pass over one example's line embeddings.
    ///
    /// Returns `(file_logit, raw_line_scores)`; the score tensor has exactly
    /// one entry per input line.
    pub fn forward(&self, lines: &[Array1<f32>]) -> (Tensor, Tensor) {
        assert!(!lines.is_empty(), "example must have at least one line");

        let w = self.w_proj.data();
        let b = self.b_proj.data();
        let v = self.v_att.data();
        let u = self.w_out.data();

        // h_i = tanh(W e_i + b); s_i = v · h_i
        let mut hidden: Vec<Array1<f32>> = Vec::with_capacity(lines.len());
        let mut scores_data: Vec<f32> = Vec::with_capacity(lines.len());
        for e in lines {
            debug_assert_eq!(e.len(), self.embed_dim);
            let mut h = Array1::<f32>::zeros(self.hidden_dim);
            for r in 0..self.hidden_dim {
                let row = &w.as_slice().expect("contiguous weights")
                    [r * self.embed_dim..(r + 1) * self.embed_dim];
                let mut acc = b[r];
                for (wv, ev) in row.iter().zip(e.iter()) {
                    acc += wv * ev;
                }
                h[r] = acc.tanh();
            }
            scores_data.push((&*v * &h).sum());
            hidden.push(h);
        }

        // α = softmax(s); c = Σ α_i h_i; logit = u · c + b_out
        let scores_arr = Array1::from(scores_data.clone());
        let alpha = softmax_stable(&scores_arr);
        let mut context = Array1::<f32>::zeros(self.hidden_dim);
        for (a, h) in alpha.iter().zip(hidden.iter()) {
            context = context + h * *a;
        }
        let logit_val = (&*u * &context).sum() + self.b_out.data()[0];

        drop(w);
        drop(b);
        drop(v);
        drop(u);

        let mut scores = Tensor::from_vec(scores_data, true);
        scores.set_backward_op(Rc::new(ScoresBackward {
            w_proj: self.w_proj.clone(),
            b_proj: self.b_proj.clone(),
            v_att: self.v_att.clone(),
            embed_dim: self.embed_dim,
            hidden_dim: self.hidden_dim,
            embeddings: lines.to_vec(),
            hidden: hidden.clone(),
            result_grad: scores.grad_cell(),
        }));

        let mut logit = Tensor::from_vec(vec![logit_val], true);
        logit.set_backward_op(Rc::new(LogitBackward {
            w_proj: self.w_proj.clone(),
            b_proj: self.b_proj.clone(),
            v_att: self.v_att.clone(),
            w_out: self.w_out.clone(),
            b_out: self.b_out.clone(),
            embed_dim: self.embed_dim,
            hidden_dim: self.hidden_dim,
            embeddings: lines.to_vec(),
            hidden,
            alpha,
            context,
            result_grad: logit.grad_cell(),
        }));

        (logit, scores)
    }

    /// Deep-copy the parameter state; later training never mutates the copy
    pub fn snapshot(&self) -> NetSnapshot {
        NetSnapshot {
            embed_dim: self.embed_dim,
            hidden_dim: self.hidden_dim,
            params: PARAM_NAMES
                .iter()
                .zip(self.params.iter())
                .map(|(name, p)| ((*name).to_string(), p.to_vec()))
                .collect(),
        }
    }

    /// Rebuild a network from a snapshot
    pub fn from_snapshot(snapshot: &NetSnapshot) -> Result<Self> {
        let expected: Vec<usize> = vec![
            snapshot.hidden_dim * snapshot.embed_dim,
            snapshot.hidden_dim,
            snapshot.hidden_dim,
            snapshot.hidden_dim,
            1,
        ];
        if snapshot.params.len() != PARAM_NAMES.len() {
            return Err(Error::Serialization(format!(
                "snapshot has {} parameters, expected {}",
                snapshot.params.len(),
                PARAM_NAMES.len()
            )));
        }
        for ((name, values), (&expected_name, &len)) in snapshot
            .params
            .iter()
            .zip(PARAM_NAMES.iter().zip(expected.iter()))
        {
            if name != expected_name || values.len() != len {
                return Err(Error::Serialization(format!(
                    "snapshot parameter {name} has {} values, expected {len} for {expected_name}",
                    values.len()
                )));
            }
        }

        let tensors: Vec<Tensor> = snapshot
            .params
            .iter()
            .map(|(_, values)| Tensor::from_vec(values.clone(), true))
            .collect();

        Ok(Self {
            embed_dim: snapshot.embed_dim,
            hidden_dim: snapshot.hidden_dim,
            w_proj: tensors[0].clone(),
            b_proj: tensors[1].clone(),
            v_att: tensors[2].clone(),
            w_out: tensors[3].clone(),
            b_out: tensors[4].clone(),
            params: tensors,
        })
    }
}

/// Backward for the raw line scores: s_i = v · tanh(W e_i + b)
struct ScoresBackward {
    w_proj: Tensor,
    b_proj: Tensor,
    v_att: Tensor,
    embed_dim: usize,
    hidden_dim: usize,
    embeddings: Vec<Array1<f32>>,
    hidden: Vec<Array1<f32>>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl ScoresBackward {
    fn accumulate_line(
        &self,
        grad_h: &Array1<f32>,
        h: &Array1<f32>,
        e: &Array1<f32>,
        grad_w: &mut Array1<f32>,
        grad_b: &mut Array1<f32>,
    ) {
        // tanh backward: ∂h/∂pre = 1 - h²
        for r in 0..self.hidden_dim {
            let grad_pre = grad_h[r] * (1.0 - h[r] * h[r]);
            grad_b[r] += grad_pre;
            for c in 0..self.embed_dim {
                grad_w[r * self.embed_dim + c] += grad_pre * e[c];
            }
        }
    }
}

impl BackwardOp for ScoresBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let v = self.v_att.data().clone();
            let mut grad_w = Array1::<f32>::zeros(self.hidden_dim * self.embed_dim);
            let mut grad_b = Array1::<f32>::zeros(self.hidden_dim);
            let mut grad_v = Array1::<f32>::zeros(self.hidden_dim);

            for (i, (h, e)) in self.hidden.iter().zip(self.embeddings.iter()).enumerate() {
                // s_i = v · h_i
                grad_v = grad_v + h * grad[i];
                let grad_h = &v * grad[i];
                self.accumulate_line(&grad_h, h, e, &mut grad_w, &mut grad_b);
            }

            self.w_proj.accumulate_grad(grad_w);
            self.b_proj.accumulate_grad(grad_b);
            self.v_att.accumulate_grad(grad_v);
        }
    }
}

/// Backward for the file logit: u · (Σ softmax(s)_i h_i) + b_out
struct LogitBackward {
    w_proj: Tensor,
    b_proj: Tensor,
    v_att: Tensor,
    w_out: Tensor,
    b_out: Tensor,
    embed_dim: usize,
    hidden_dim: usize,
    embeddings: Vec<Array1<f32>>,
    hidden: Vec<Array1<f32>>,
    alpha: Array1<f32>,
    context: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for LogitBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let g = grad[0];
            let v = self.v_att.data().clone();
            let u = self.w_out.data().clone();

            self.w_out.accumulate_grad(&self.context * g);
            self.b_out.accumulate_grad(Array1::from(vec![g]));

            // Through the fusion c = Σ α_i h_i
            let grad_c = &u * g;
            let grad_alpha: Vec<f32> = self
                .hidden
                .iter()
                .map(|h| (&grad_c * h).sum())
                .collect();

            // Softmax jacobian: ∂L/∂s_j = α_j (∂L/∂α_j - Σ_k α_k ∂L/∂α_k)
            let dot: f32 = self
                .alpha
                .iter()
                .zip(grad_alpha.iter())
                .map(|(a, ga)| a * ga)
                .sum();
            let grad_s: Vec<f32> = self
                .alpha
                .iter()
                .zip(grad_alpha.iter())
                .map(|(a, ga)| a * (ga - dot))
                .collect();

            let mut grad_w = Array1::<f32>::zeros(self.hidden_dim * self.embed_dim);
            let mut grad_b = Array1::<f32>::zeros(self.hidden_dim);
            let mut grad_v = Array1::<f32>::zeros(self.hidden_dim);

            for (i, (h, e)) in self.hidden.iter().zip(self.embeddings.iter()).enumerate() {
                // h_i receives gradient from the fusion and from s_i = v · h_i
                grad_v = grad_v + h * grad_s[i];
                let grad_h = &grad_c * self.alpha[i] + &v * grad_s[i];

                for r in 0..self.hidden_dim {
                    let grad_pre = grad_h[r] * (1.0 - h[r] * h[r]);
                    grad_b[r] += grad_pre;
                    for c in 0..self.embed_dim {
                        grad_w[r * self.embed_dim + c] += grad_pre * e[c];
                    }
                }
            }

            self.w_proj.accumulate_grad(grad_w);
            self.b_proj.accumulate_grad(grad_b);
            self.v_att.accumulate_grad(grad_v);
        }
    }
}
