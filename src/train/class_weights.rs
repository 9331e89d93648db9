//! Inverse-frequency class balancing

/// Per-class loss weights computed once per run from the training label
/// distribution.
///
/// `w_c = total / (num_classes * count_c)`, so the rarer class receives the
/// larger weight. Applied inside the training file loss only; validation
/// always runs with uniform weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassWeights {
    /// Weight applied to clean (label 0) examples
    pub clean: f32,
    /// Weight applied to defective (label 1) examples
    pub defect: f32,
}

impl ClassWeights {
    /// Balanced weights from the training file labels
    pub fn balanced(labels: &[f32]) -> Self {
        let total = labels.len() as f32;
        let defect_count = labels.iter().filter(|&&l| l == 1.0).count() as f32;
        let clean_count = total - defect_count;

        let weight = |count: f32| if count > 0.0 { total / (2.0 * count) } else { 0.0 };

        Self {
            clean: weight(clean_count),
            defect: weight(defect_count),
        }
    }

    /// Uniform weights, used during validation
    pub fn uniform() -> Self {
        Self {
            clean: 1.0,
            defect: 1.0,
        }
    }

    /// Weight for one example given its file label
    pub fn weight_for(&self, label: f32) -> f32 {
        if label == 0.0 {
            self.clean
        } else {
            self.defect
        }
    }
}
