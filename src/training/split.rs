//! Holdout split of the aggregated rows.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices for the two sides of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// `true` when both sides are the same rows.
    pub is_resubstitution: bool,
}

/// Splits `n` rows into train and test index sets.
///
/// With fewer than `min_rows` rows there is no holdout: both sides contain
/// every row. Otherwise `ceil(n * test_fraction)` rows, chosen by a shuffle
/// seeded with `seed`, go to the test side.
pub fn train_test_split(n: usize, test_fraction: f64, min_rows: usize, seed: u64) -> Split {
    let all: Vec<usize> = (0..n).collect();
    if n < min_rows.max(2) {
        return Split {
            train: all.clone(),
            test: all,
            is_resubstitution: true,
        };
    }

    let mut shuffled = all;
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let train = shuffled.split_off(n_test);

    Split {
        train,
        test: shuffled,
        is_resubstitution: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_small_dataset_reuses_rows() {
        let split = train_test_split(19, 0.2, 20, 42);
        assert!(split.is_resubstitution);
        assert_eq!(split.train, split.test);
        assert_eq!(split.train.len(), 19);
    }

    #[test]
    fn test_holdout_sizes() {
        let split = train_test_split(21, 0.2, 20, 42);
        assert!(!split.is_resubstitution);
        assert_eq!(split.test.len(), 5);
        assert_eq!(split.train.len(), 16);

        let union: BTreeSet<usize> = split.train.iter().chain(&split.test).copied().collect();
        assert_eq!(union.len(), 21);
    }

    #[test]
    fn test_seed_is_reproducible() {
        assert_eq!(train_test_split(50, 0.2, 20, 42), train_test_split(50, 0.2, 20, 42));
        assert_ne!(
            train_test_split(50, 0.2, 20, 42).test,
            train_test_split(50, 0.2, 20, 7).test
        );
    }
}
