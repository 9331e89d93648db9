//! Rank-discounted line divergence
//!
//! Measures whether the lines the model attends to most are the lines the
//! ground truth marks defective. The attention vector is restricted to its
//! top 20% of lines; the label vector is indexed by that same attention
//! ranking (not re-sorted independently; the question is "are the
//! top-attended lines truly defective"). Both restrictions pass through
//! softmax, and the symmetric divergence between them is discounted per
//! position by the ground truth's own ranking, NDCG-style: positions the
//! labels rank first lose the least.

use crate::autograd::{softmax_stable, BackwardOp, Tensor};
use crate::data::Example;
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Fraction of a file's lines kept in the top-k restriction
pub const TOP_K_FRACTION: f32 = 0.2;

const EPSILON: f32 = 1e-8;
const LN_2: f32 = std::f32::consts::LN_2;

/// Whether an example carries usable line supervision.
///
/// Clean files have no meaningful line annotation, and a defective file with
/// an all-zero line vector has nothing to rank against.
pub fn is_line_eligible(example: &Example) -> bool {
    example.label == 1.0 && example.has_line_annotation()
}

/// Line loss for one eligible example, given its min–max-normalized
/// attention.
///
/// Returns a constant zero (no gradient path) for files too short for a
/// non-empty top-k restriction; the example still counts as eligible.
pub fn example_line_loss(normalized_attention: &Tensor, line_labels: &[f32]) -> Tensor {
    debug_assert_eq!(normalized_attention.len(), line_labels.len());

    let top_k = (TOP_K_FRACTION * line_labels.len() as f32) as usize;
    if top_k == 0 {
        return Tensor::zeros(1, false);
    }

    let (restricted, indices) = crate::autograd::take_top_k(normalized_attention, top_k);
    let restricted_labels: Array1<f32> = indices.iter().map(|&i| line_labels[i]).collect();
    rank_divergence(&restricted, &restricted_labels)
}

/// 1-based standing of each position when `values` is sorted descending,
/// ties keeping original order
fn descending_ranks(values: &Array1<f32>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[j].total_cmp(&values[i]));

    let mut ranks = vec![0usize; values.len()];
    for (pos, &idx) in order.iter().enumerate() {
        ranks[idx] = pos + 1;
    }
    ranks
}

/// Rank-discounted symmetric divergence between an attention restriction and
/// its label restriction.
///
/// `P = softmax(attention)`, `Q = softmax(labels)`, `M = 0.5*(P+Q) + ε`,
/// discount `d_i = 1/log2(rank_i + 1)` with ranks taken from `Q` descending;
/// the score is `0.5 * (KL(P,M,d) + KL(Q,M,d))` where each term sums
/// `x_i * log2(x_i/m_i) * d_i`. The input order is asymmetric by design:
/// `P` comes from the prediction, `Q` from the ground truth, and the
/// discounts always follow the ground truth's ranking.
pub fn rank_divergence(attention: &Tensor, labels: &Array1<f32>) -> Tensor {
    assert_eq!(attention.len(), labels.len(), "restrictions must align");
    assert!(!labels.is_empty(), "divergence needs at least one position");

    let p = softmax_stable(&attention.data());
    let q = softmax_stable(labels);
    let m = (&p + &q).mapv(|v| 0.5 * v + EPSILON);

    let ranks = descending_ranks(&q);
    let discounts: Array1<f32> =
        ranks.iter().map(|&r| 1.0 / ((r + 1) as f32).log2()).collect();

    let kl = |x: &Array1<f32>| -> f32 {
        x.iter()
            .zip(m.iter())
            .zip(discounts.iter())
            .map(|((&xi, &mi), &di)| xi * (xi / mi).log2() * di)
            .sum()
    };
    let score = 0.5 * (kl(&p) + kl(&q));

    let requires_grad = attention.requires_grad();
    let mut result = Tensor::from_vec(vec![score], requires_grad);

    if requires_grad {
        result.set_backward_op(Rc::new(RankDivergenceBackward {
            attention: attention.clone(),
            p,
            q,
            m,
            discounts,
            result_grad: result.grad_cell(),
        }));
    }

    result
}

struct RankDivergenceBackward {
    attention: Tensor,
    p: Array1<f32>,
    q: Array1<f32>,
    m: Array1<f32>,
    discounts: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for RankDivergenceBackward {
    fn backward(&self) {
        if let Some(grad_out) = self.result_grad.borrow().as_ref() {
            if self.attention.requires_grad() {
                // ∂score/∂P_j, accounting for M's dependence on P:
                //   0.5 * d_j * [log2(P_j/M_j) + (1 - 0.5*P_j/M_j)/ln2
                //                - 0.5*Q_j/(M_j*ln2)]
                let grad_p: Vec<f32> = self
                    .p
                    .iter()
                    .zip(self.q.iter())
                    .zip(self.m.iter().zip(self.discounts.iter()))
                    .map(|((&pj, &qj), (&mj, &dj))| {
                        0.5 * dj
                            * ((pj / mj).log2() + (1.0 - 0.5 * pj / mj) / LN_2
                                - 0.5 * qj / (mj * LN_2))
                    })
                    .collect();

                // Through softmax: ∂L/∂a_i = P_i * (g_i - Σ_k P_k g_k)
                let dot: f32 = self
                    .p
                    .iter()
                    .zip(grad_p.iter())
                    .map(|(&pk, &gk)| pk * gk)
                    .sum();
                let grad_att: Array1<f32> = self
                    .p
                    .iter()
                    .zip(grad_p.iter())
                    .map(|(&pi, &gi)| grad_out[0] * pi * (gi - dot))
                    .collect();

                self.attention.accumulate_grad(grad_att);
            }

            if let Some(op) = self.attention.backward_op() {
                op.backward();
            }
        }
    }
}
