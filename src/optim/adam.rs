//! Adam optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Adam optimizer with bias correction
///
/// Update rule:
/// ```text
/// m_t = β1 * m_{t-1} + (1 - β1) * g
/// v_t = β2 * v_{t-1} + (1 - β2) * g²
/// θ_t = θ_{t-1} - lr_t * m_t / (√v_t + ε)
/// ```
/// where `lr_t = lr * √(1 - β2^t) / (1 - β1^t)` folds in bias correction.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>,
    v: Vec<Option<Array1<f32>>>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create Adam with the usual defaults (β1=0.9, β2=0.999, ε=1e-8)
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    fn ensure_moments(&mut self, params: &[Tensor]) {
        if self.m.is_empty() {
            self.m = params.iter().map(|_| None).collect();
            self.v = params.iter().map(|_| None).collect();
        }
    }

    /// Number of steps taken so far
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Moment buffers and step counter, for checkpoint persistence
    #[must_use]
    pub fn export_state(&self) -> AdamState {
        AdamState {
            step: self.t,
            first_moments: self.m.iter().map(|m| m.as_ref().map(Array1::to_vec)).collect(),
            second_moments: self.v.iter().map(|v| v.as_ref().map(Array1::to_vec)).collect(),
        }
    }

    /// Restore moment buffers and step counter from a checkpoint
    pub fn restore_state(&mut self, state: AdamState) {
        self.t = state.step;
        self.m = state.first_moments.into_iter().map(|m| m.map(Array1::from)).collect();
        self.v = state.second_moments.into_iter().map(|v| v.map(Array1::from)).collect();
    }
}

/// Serializable Adam moment state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamState {
    /// Optimizer step counter
    pub step: u64,
    /// First moment buffers, one per parameter
    pub first_moments: Vec<Option<Vec<f32>>>,
    /// Second moment buffers, one per parameter
    pub second_moments: Vec<Option<Vec<f32>>>,
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_moments(params);
        self.t += 1;

        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for (i, param) in params.iter_mut().enumerate() {
            if let Some(grad) = param.grad() {
                let m_t = if let Some(m) = &self.m[i] {
                    m * self.beta1 + &grad * (1.0 - self.beta1)
                } else {
                    &grad * (1.0 - self.beta1)
                };

                let grad_sq = &grad * &grad;
                let v_t = if let Some(v) = &self.v[i] {
                    v * self.beta2 + &grad_sq * (1.0 - self.beta2)
                } else {
                    &grad_sq * (1.0 - self.beta2)
                };

                let update = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
                let stepped = {
                    let data = param.data();
                    &*data - &update
                };
                *param.data_mut() = stepped;

                self.m[i] = Some(m_t);
                self.v[i] = Some(v_t);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}
