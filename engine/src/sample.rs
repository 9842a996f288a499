use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A single supervised sample, a feature vector and its label vector.
///
/// Samples are immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    features: Vec<f32>,
    label: Vec<f32>,
}

impl Sample {
    pub fn new(features: Vec<f32>, label: Vec<f32>) -> Self {
        Self { features, label }
    }

    #[inline]
    pub fn features(&self) -> &[f32] {
        &self.features
    }

    #[inline]
    pub fn label(&self) -> &[f32] {
        &self.label
    }
}

/// The local training and test samples.
///
/// Each collection sits behind its own lock so appending to one never waits
/// on the other. Collections only grow, nothing is ever removed.
#[derive(Debug, Default)]
pub struct SampleStore {
    train: RwLock<Vec<Sample>>,
    test: RwLock<Vec<Sample>>,
}

impl SampleStore {
    /// Creates a new empty `SampleStore`.
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, is_training: bool) -> &RwLock<Vec<Sample>> {
        if is_training { &self.train } else { &self.test }
    }

    /// Appends `sample` to the training or the test collection.
    ///
    /// # Arguments
    /// * `sample` - The new sample.
    /// * `is_training` - Whether it belongs to the training collection.
    pub fn add_sample(&self, sample: Sample, is_training: bool) {
        self.collection(is_training).write().push(sample);
    }

    /// Appends every sample of `samples` while holding the lock once.
    ///
    /// # Arguments
    /// * `samples` - The new samples.
    /// * `is_training` - Whether they belong to the training collection.
    ///
    /// # Returns
    /// The amount of samples appended.
    pub fn add_samples<I>(&self, samples: I, is_training: bool) -> usize
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut collection = self.collection(is_training).write();
        let before = collection.len();
        collection.extend(samples);
        collection.len() - before
    }

    pub fn train_count(&self) -> usize {
        self.train.read().len()
    }

    pub fn test_count(&self) -> usize {
        self.test.read().len()
    }

    pub(crate) fn write_train(&self) -> RwLockWriteGuard<'_, Vec<Sample>> {
        self.train.write()
    }

    pub(crate) fn read_test(&self) -> RwLockReadGuard<'_, Vec<Sample>> {
        self.test.read()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn sample(x: f32) -> Sample {
        Sample::new(vec![x, x + 1.0], vec![1.0, 0.0])
    }

    #[test]
    fn add_sample_counts_only_its_collection() {
        let store = SampleStore::new();

        store.add_sample(sample(0.0), true);
        assert_eq!(store.train_count(), 1);
        assert_eq!(store.test_count(), 0);

        store.add_sample(sample(1.0), false);
        store.add_sample(sample(2.0), false);
        assert_eq!(store.train_count(), 1);
        assert_eq!(store.test_count(), 2);
    }

    #[test]
    fn duplicates_are_kept() {
        let store = SampleStore::new();
        store.add_sample(sample(3.0), true);
        store.add_sample(sample(3.0), true);
        assert_eq!(store.train_count(), 2);
    }

    #[test]
    fn add_samples_reports_appended() {
        let store = SampleStore::new();
        store.add_sample(sample(0.0), false);

        let added = store.add_samples((1..5).map(|i| sample(i as f32)), false);
        assert_eq!(added, 4);
        assert_eq!(store.test_count(), 5);
    }

    #[test]
    fn concurrent_appends_are_all_visible() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let store = Arc::new(SampleStore::new());

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        store.add_sample(sample(i as f32), t % 2 == 0);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.train_count(), THREADS / 2 * PER_THREAD);
        assert_eq!(store.test_count(), THREADS / 2 * PER_THREAD);
    }

    #[test]
    fn held_train_lock_does_not_block_test_appends() {
        let store = SampleStore::new();
        let _train = store.write_train();

        store.add_sample(sample(0.0), false);
        assert_eq!(store.test_count(), 1);
    }
}
