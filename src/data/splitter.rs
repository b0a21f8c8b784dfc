// ============================================================
// Data — Train/Eval Splitter
// ============================================================
// Shuffles samples and splits them into a training set and an
// evaluation set.
//
// The shuffle is seeded: `train`, `eval` and `publish` run as
// separate invocations and must all see the same split, or eval
// would score the model on rows it was trained on.
//
// Uses Fisher-Yates via rand::seq::SliceRandom over a StdRng.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, eval).
///
/// `train_fraction` is clamped to [0, 1]; e.g. 0.8 keeps 80% for training.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} evaluation ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len() * 100) / total.max(1),
    );

    (samples, val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val) = split_train_val(items, 0.8, 42);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(), 20);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val) = split_train_val(items, 0.7, 1);
        let mut all: Vec<usize> = train.into_iter().chain(val).collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_val((0..30).collect::<Vec<u32>>(), 0.5, 9);
        let b = split_train_val((0..30).collect::<Vec<u32>>(), 0.5, 9);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, val) = split_train_val(Vec::<usize>::new(), 0.8, 0);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_fraction_is_clamped() {
        let (train, val) = split_train_val((0..10).collect::<Vec<usize>>(), 1.5, 0);
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
    }
}
