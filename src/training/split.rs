//! Seeded train/test splitting

use super::dataset::Dataset;
use crate::error::{ModellingError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Materialized train/test partition of a [`Dataset`]
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub indices: SplitIndices,
}

impl Split {
    pub fn n_train(&self) -> usize {
        self.y_train.len()
    }

    pub fn n_test(&self) -> usize {
        self.y_test.len()
    }
}

/// Shuffled train/test splitter.
///
/// The test partition holds `ceil(test_size * n)` rows and the train partition
/// the remainder. Rows are assigned from a single permutation: the first
/// `n_test` permuted indices go to test, the rest to train.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    test_size: f64,
    random_state: Option<u64>,
}

impl TrainTestSplit {
    /// Create a splitter holding out `test_size` of the rows
    pub fn new(test_size: f64) -> Self {
        Self {
            test_size,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Partition sizes `(n_train, n_test)` for `n_samples` rows
    pub fn sizes(&self, n_samples: usize) -> Result<(usize, usize)> {
        // Written as a negated range check so NaN is rejected too.
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ModellingError::invalid_parameter(
                "test_size",
                self.test_size,
                "must be strictly between 0 and 1",
            ));
        }

        let n_test = (self.test_size * n_samples as f64).ceil() as usize;
        let n_train = n_samples.saturating_sub(n_test);

        if n_train == 0 || n_test == 0 {
            let empty = if n_test == 0 { "test" } else { "train" };
            return Err(ModellingError::ValidationError(format!(
                "with n_samples={} and test_size={}, the resulting {} set would be empty \
                 (train={}, test={})",
                n_samples, self.test_size, empty, n_train, n_test
            )));
        }

        Ok((n_train, n_test))
    }

    /// Generate train/test row indices
    pub fn split_indices(&self, n_samples: usize) -> Result<SplitIndices> {
        let (n_train, n_test) = self.sizes(n_samples)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        indices.shuffle(&mut rng);

        let test_indices = indices[..n_test].to_vec();
        let train_indices = indices[n_test..n_test + n_train].to_vec();

        Ok(SplitIndices {
            train_indices,
            test_indices,
        })
    }

    /// Split a dataset into train and test partitions
    pub fn split(&self, dataset: &Dataset) -> Result<Split> {
        let indices = self.split_indices(dataset.n_rows())?;

        let x = dataset.features();
        let y = dataset.target();

        Ok(Split {
            x_train: x.select(Axis(0), &indices.train_indices),
            x_test: x.select(Axis(0), &indices.test_indices),
            y_train: y.select(Axis(0), &indices.train_indices),
            y_test: y.select(Axis(0), &indices.test_indices),
            indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn dataset(n: usize) -> Dataset {
        let x = Array2::from_shape_fn((n, 2), |(r, c)| (r * 10 + c) as f64);
        let y = Array1::from_iter((0..n).map(|r| r as f64));
        Dataset::from_arrays(vec!["a".into(), "b".into()], x, y).unwrap()
    }

    #[test]
    fn test_sizes_hundred_rows() {
        let splitter = TrainTestSplit::new(0.2).with_random_state(42);
        assert_eq!(splitter.sizes(100).unwrap(), (80, 20));
    }

    #[test]
    fn test_test_size_rounds_up() {
        let splitter = TrainTestSplit::new(0.25);
        assert_eq!(splitter.sizes(10).unwrap(), (7, 3));
    }

    #[test]
    fn test_partitions_are_disjoint_and_cover_all_rows() {
        let splitter = TrainTestSplit::new(0.3).with_random_state(42);
        let idx = splitter.split_indices(57).unwrap();

        let train: HashSet<_> = idx.train_indices.iter().copied().collect();
        let test: HashSet<_> = idx.test_indices.iter().copied().collect();

        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 57);
        assert_eq!(train.union(&test).count(), 57);
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = TrainTestSplit::new(0.2).with_random_state(42).split_indices(100).unwrap();
        let b = TrainTestSplit::new(0.2).with_random_state(42).split_indices(100).unwrap();
        assert_eq!(a, b);

        let c = TrainTestSplit::new(0.2).with_random_state(7).split_indices(100).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_test_sizes() {
        for bad in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let err = TrainTestSplit::new(bad).sizes(100).unwrap_err();
            assert!(
                matches!(err, ModellingError::InvalidParameter { ref name, .. } if name == "test_size"),
                "test_size={} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_empty_train_partition_rejected() {
        // ceil(0.9 * 1) = 1 test row leaves nothing to train on
        let err = TrainTestSplit::new(0.9).sizes(1).unwrap_err();
        assert!(matches!(err, ModellingError::ValidationError(ref m) if m.contains("train set would be empty")));
    }

    #[test]
    fn test_empty_test_partition_named() {
        let err = TrainTestSplit::new(0.2).sizes(0).unwrap_err();
        assert!(matches!(err, ModellingError::ValidationError(ref m) if m.contains("test set would be empty")));
    }

    #[test]
    fn test_split_rows_follow_indices() {
        let ds = dataset(20);
        let split = TrainTestSplit::new(0.2).with_random_state(42).split(&ds).unwrap();

        assert_eq!(split.n_train(), 16);
        assert_eq!(split.n_test(), 4);
        assert_eq!(split.x_train.ncols(), 2);

        for (row, &orig) in split.indices.test_indices.iter().enumerate() {
            assert_eq!(split.y_test[row], orig as f64);
            assert_eq!(split.x_test[[row, 1]], (orig * 10 + 1) as f64);
        }
    }
}
