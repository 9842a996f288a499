use ndarray::{Array2, Axis};

use crate::{Sample, codec::Tensor};

type EncodeFn = dyn Fn(&[&[f32]]) -> Tensor + Send + Sync;
type AllocFn = dyn Fn(usize) -> Tensor + Send + Sync;
type MetricFn = dyn Fn(&[Sample], &[u8]) -> f32 + Send + Sync;

/// How samples are turned into engine tensors and how predictions are scored.
///
/// The functions are injected at construction so the training engine stays
/// independent from the feature and label encodings.
pub struct SampleSpec {
    encode_features: Box<EncodeFn>,
    encode_labels: Box<EncodeFn>,
    empty_y: Box<AllocFn>,
    loss: Box<MetricFn>,
    accuracy: Box<MetricFn>,
}

impl SampleSpec {
    /// Creates a new `SampleSpec`.
    ///
    /// # Arguments
    /// * `encode_features` - Packs a batch of feature vectors into the `x` tensor.
    /// * `encode_labels` - Packs a batch of label vectors into the `y` tensor.
    /// * `empty_y` - Allocates the prediction tensor for a batch of the given length.
    /// * `loss` - Scores predictions (raw `logits` bytes) against the samples.
    /// * `accuracy` - Same as `loss` but for accuracy.
    pub fn new<X, Y, E, L, A>(
        encode_features: X,
        encode_labels: Y,
        empty_y: E,
        loss: L,
        accuracy: A,
    ) -> Self
    where
        X: Fn(&[&[f32]]) -> Tensor + Send + Sync + 'static,
        Y: Fn(&[&[f32]]) -> Tensor + Send + Sync + 'static,
        E: Fn(usize) -> Tensor + Send + Sync + 'static,
        L: Fn(&[Sample], &[u8]) -> f32 + Send + Sync + 'static,
        A: Fn(&[Sample], &[u8]) -> f32 + Send + Sync + 'static,
    {
        Self {
            encode_features: Box::new(encode_features),
            encode_labels: Box::new(encode_labels),
            empty_y: Box::new(empty_y),
            loss: Box::new(loss),
            accuracy: Box::new(accuracy),
        }
    }

    /// A classifier over dense `f32` features and one-hot labels of `classes` entries.
    ///
    /// Tensors are row major little endian `f32`. The loss is the mean negative
    /// log likelihood of the true class and the accuracy is the share of rows
    /// whose argmax matches the label's.
    pub fn one_hot_classifier(classes: usize) -> Self {
        Self::new(
            pack_f32,
            pack_f32,
            move |len| crate::codec::zeroed(len * classes * size_of::<f32>()),
            move |samples, logits| negative_log_likelihood(samples, logits, classes),
            move |samples, logits| classifier_accuracy(samples, logits, classes),
        )
    }

    pub fn encode_features(&self, features: &[&[f32]]) -> Tensor {
        (self.encode_features)(features)
    }

    pub fn encode_labels(&self, labels: &[&[f32]]) -> Tensor {
        (self.encode_labels)(labels)
    }

    pub fn empty_y(&self, len: usize) -> Tensor {
        (self.empty_y)(len)
    }

    pub fn loss(&self, samples: &[Sample], logits: &[u8]) -> f32 {
        (self.loss)(samples, logits)
    }

    pub fn accuracy(&self, samples: &[Sample], logits: &[u8]) -> f32 {
        (self.accuracy)(samples, logits)
    }
}

impl std::fmt::Debug for SampleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleSpec").finish_non_exhaustive()
    }
}

/// Packs rows of `f32` into a single little endian row major buffer.
pub fn pack_f32(rows: &[&[f32]]) -> Tensor {
    let bytes = rows
        .iter()
        .flat_map(|row| row.iter())
        .flat_map(|v| v.to_le_bytes())
        .collect();

    Tensor::new(bytes)
}

/// Reads a little endian `f32` buffer back.
pub fn unpack_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(size_of::<f32>())
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn predictions(logits: &[u8], rows: usize, classes: usize) -> Option<Array2<f32>> {
    let mut values = unpack_f32(logits);
    if values.len() < rows * classes {
        return None;
    }

    values.truncate(rows * classes);
    Array2::from_shape_vec((rows, classes), values).ok()
}

fn true_class(label: &[f32]) -> usize {
    label
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or_default()
}

fn negative_log_likelihood(samples: &[Sample], logits: &[u8], classes: usize) -> f32 {
    let Some(preds) = predictions(logits, samples.len(), classes) else {
        return f32::NAN;
    };

    let total: f32 = preds
        .axis_iter(Axis(0))
        .zip(samples)
        .map(|(row, sample)| {
            // A label wider than the logits scores as a zero probability.
            let p = row.get(true_class(sample.label())).copied().unwrap_or(0.0);
            -p.max(f32::MIN_POSITIVE).ln()
        })
        .sum();

    total / samples.len() as f32
}

fn classifier_accuracy(samples: &[Sample], logits: &[u8], classes: usize) -> f32 {
    let Some(preds) = predictions(logits, samples.len(), classes) else {
        return f32::NAN;
    };

    let hits = preds
        .axis_iter(Axis(0))
        .zip(samples)
        .filter(|(row, sample)| {
            let predicted = row
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i);

            predicted == Some(true_class(sample.label()))
        })
        .count();

    hits as f32 / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(class: usize, classes: usize) -> Vec<f32> {
        (0..classes).map(|c| if c == class { 1.0 } else { 0.0 }).collect()
    }

    fn logits(rows: &[[f32; 3]]) -> Vec<u8> {
        let rows: Vec<&[f32]> = rows.iter().map(|r| r.as_slice()).collect();
        pack_f32(&rows).into_inner()
    }

    #[test]
    fn pack_is_row_major_little_endian() {
        let a = [1.0f32, 2.0];
        let b = [3.0f32];
        let packed = pack_f32(&[&a, &b]).into_inner();

        assert_eq!(packed.len(), 12);
        assert_eq!(&packed[..4], &1.0f32.to_le_bytes());
        assert_eq!(unpack_f32(&packed), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn accuracy_counts_argmax_hits() {
        let spec = SampleSpec::one_hot_classifier(3);
        let samples = vec![
            Sample::new(vec![0.0], one_hot(0, 3)),
            Sample::new(vec![0.0], one_hot(2, 3)),
        ];

        let preds = logits(&[[0.8, 0.1, 0.1], [0.6, 0.3, 0.1]]);
        assert_eq!(spec.accuracy(&samples, &preds), 0.5);
    }

    #[test]
    fn perfect_predictions_have_zero_loss() {
        let spec = SampleSpec::one_hot_classifier(3);
        let samples = vec![Sample::new(vec![0.0], one_hot(1, 3))];

        let preds = logits(&[[0.0, 1.0, 0.0]]);
        assert_eq!(spec.loss(&samples, &preds), 0.0);
        assert_eq!(spec.accuracy(&samples, &preds), 1.0);
    }

    #[test]
    fn loss_is_mean_negative_log_likelihood() {
        let spec = SampleSpec::one_hot_classifier(3);
        let samples = vec![
            Sample::new(vec![0.0], one_hot(0, 3)),
            Sample::new(vec![0.0], one_hot(1, 3)),
        ];

        let preds = logits(&[[0.5, 0.25, 0.25], [0.5, 0.25, 0.25]]);
        let expected = -(0.5f32.ln() + 0.25f32.ln()) / 2.0;
        assert!((spec.loss(&samples, &preds) - expected).abs() < 1e-6);
    }

    #[test]
    fn short_logits_give_nan() {
        let spec = SampleSpec::one_hot_classifier(3);
        let samples = vec![Sample::new(vec![0.0], one_hot(0, 3)); 2];

        let preds = logits(&[[1.0, 0.0, 0.0]]);
        assert!(spec.loss(&samples, &preds).is_nan());
        assert!(spec.accuracy(&samples, &preds).is_nan());
    }

    #[test]
    fn labels_wider_than_the_logits_score_as_misses() {
        let spec = SampleSpec::one_hot_classifier(3);
        let samples = vec![Sample::new(vec![0.0], one_hot(4, 5))];

        let preds = logits(&[[1.0, 0.0, 0.0]]);
        assert_eq!(spec.loss(&samples, &preds), -f32::MIN_POSITIVE.ln());
        assert_eq!(spec.accuracy(&samples, &preds), 0.0);
    }

    #[test]
    fn empty_y_is_sized_by_batch() {
        let spec = SampleSpec::one_hot_classifier(4);
        assert_eq!(spec.empty_y(5).get_ref().len(), 5 * 4 * 4);
    }
}
