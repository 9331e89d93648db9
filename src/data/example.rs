//! In-memory training examples and batching

use rand::seq::SliceRandom;
use rand::rngs::StdRng;

/// One source file, prepared for training.
///
/// Invariant: `token_ids.len() == line_labels.len()`: one token sequence and
/// one label per line.
#[derive(Debug, Clone)]
pub struct Example {
    /// Source file name, for diagnostics
    pub name: String,
    /// Per-line fixed-length token-id sequences
    pub token_ids: Vec<Vec<u32>>,
    /// Binary file label (1.0 = defective)
    pub label: f32,
    /// Binary per-line labels; all-zero when no annotation exists
    pub line_labels: Vec<f32>,
}

impl Example {
    /// Number of lines in the file
    pub fn line_count(&self) -> usize {
        self.token_ids.len()
    }

    /// Whether any line carries a positive annotation
    pub fn has_line_annotation(&self) -> bool {
        self.line_labels.iter().any(|&l| l == 1.0)
    }
}

/// Shuffled fixed-size batches for a training epoch.
///
/// A trailing partial batch is dropped so every training batch has the full
/// configured size.
pub fn shuffled_batches<'a>(
    examples: &'a [Example],
    batch_size: usize,
    rng: &mut StdRng,
) -> Vec<Vec<&'a Example>> {
    let mut order: Vec<&Example> = examples.iter().collect();
    order.shuffle(rng);

    order
        .chunks(batch_size)
        .filter(|chunk| chunk.len() == batch_size)
        .map(<[&Example]>::to_vec)
        .collect()
}

/// In-order batches for validation; the trailing partial batch is kept.
pub fn sequential_batches(examples: &[Example], batch_size: usize) -> Vec<Vec<&Example>> {
    examples
        .chunks(batch_size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn make_examples(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| Example {
                name: format!("file{i}.java"),
                token_ids: vec![vec![1, 2, 0]; 3],
                label: (i % 2) as f32,
                line_labels: vec![0.0; 3],
            })
            .collect()
    }

    #[test]
    fn test_shuffled_batches_drop_last() {
        let examples = make_examples(7);
        let mut rng = StdRng::seed_from_u64(0);
        let batches = shuffled_batches(&examples, 3, &mut rng);

        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 3));
    }

    #[test]
    fn test_shuffled_batches_deterministic_under_seed() {
        let examples = make_examples(10);
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);

        let a = shuffled_batches(&examples, 2, &mut rng_a);
        let b = shuffled_batches(&examples, 2, &mut rng_b);

        let names =
            |bs: &[Vec<&Example>]| -> Vec<String> {
                bs.iter().flatten().map(|e| e.name.clone()).collect()
            };
        assert_eq!(names(&a), names(&b));
    }

    #[test]
    fn test_sequential_batches_keep_partial() {
        let examples = make_examples(7);
        let batches = sequential_batches(&examples, 3);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 1);
        // Order is fixed
        assert_eq!(batches[0][0].name, "file0.java");
    }

    #[test]
    fn test_has_line_annotation() {
        let mut e = make_examples(1).remove(0);
        assert!(!e.has_line_annotation());
        e.line_labels[1] = 1.0;
        assert!(e.has_line_annotation());
    }
}
