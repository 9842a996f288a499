use std::{io::Cursor, sync::Arc};

use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio_util::sync::CancellationToken;

use crate::{
    EngineErr, EngineFault, Result, Sample, SampleSpec, SampleStore,
    batching::trailing_windows,
    codec::{self, ParameterCodec, TensorMap, WeightSet},
    progress::{self, EpochProgress, ProgressTx},
};

/// Names of the entry points every inference engine exposes.
pub mod signature {
    /// No meaningful input, outputs the current weights as `a0..aN`.
    pub const PARAMETERS: &str = "parameters";
    /// Inputs `a0..aN`, applies them and outputs the resulting weights.
    pub const RESTORE: &str = "restore";
    /// Input `x`, output `logits`.
    pub const INFER: &str = "infer";
    /// Inputs `x` and `y`, output `loss` as a single little endian `f32`.
    pub const TRAIN: &str = "train";
}

/// Tensor names used by the `infer` and `train` signatures.
pub mod tensor {
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const LOGITS: &str = "logits";
    pub const LOSS: &str = "loss";
}

/// A trainable model invoked by signature name.
///
/// Implementations are not expected to support concurrent invocations, the
/// training engine serializes every call.
pub trait InferenceEngine: Send {
    /// Runs the signature `key`.
    ///
    /// # Arguments
    /// * `key` - One of the names in `signature`.
    /// * `inputs` - The named input tensors.
    /// * `outputs` - Pre-allocated output tensors the engine writes into.
    ///
    /// # Errors
    /// Whatever the engine failed with, it reaches the caller unchanged.
    fn run_signature(
        &mut self,
        key: &str,
        inputs: &TensorMap,
        outputs: &mut TensorMap,
    ) -> std::result::Result<(), EngineFault>;
}

/// Drives the local model over the samples held in its `SampleStore`.
///
/// Lock order is always the sample lock first and the invocation lock second.
pub struct TrainingEngine {
    engine: Mutex<Box<dyn InferenceEngine>>,
    store: SampleStore,
    spec: SampleSpec,
    codec: ParameterCodec,
    rng: Mutex<StdRng>,
}

impl TrainingEngine {
    /// Creates a new `TrainingEngine` with an empty sample store.
    ///
    /// # Arguments
    /// * `engine` - The inference engine, owned from now on.
    /// * `spec` - How samples are encoded and predictions scored.
    /// * `layer_sizes` - The size in bytes of every model layer.
    pub fn new<E>(engine: E, spec: SampleSpec, layer_sizes: impl Into<Arc<[usize]>>) -> Self
    where
        E: InferenceEngine + 'static,
    {
        Self::with_rng(engine, spec, layer_sizes, StdRng::from_os_rng())
    }

    /// Same as `new` but shuffles with a seeded generator, for reproducible runs.
    pub fn with_seed<E>(
        engine: E,
        spec: SampleSpec,
        layer_sizes: impl Into<Arc<[usize]>>,
        seed: u64,
    ) -> Self
    where
        E: InferenceEngine + 'static,
    {
        Self::with_rng(engine, spec, layer_sizes, StdRng::seed_from_u64(seed))
    }

    fn with_rng<E>(
        engine: E,
        spec: SampleSpec,
        layer_sizes: impl Into<Arc<[usize]>>,
        rng: StdRng,
    ) -> Self
    where
        E: InferenceEngine + 'static,
    {
        let engine: Box<dyn InferenceEngine> = Box::new(engine);

        Self {
            engine: Mutex::new(engine),
            store: SampleStore::new(),
            spec,
            codec: ParameterCodec::new(layer_sizes),
            rng: Mutex::new(rng),
        }
    }

    pub fn codec(&self) -> &ParameterCodec {
        &self.codec
    }

    pub fn add_sample(&self, sample: Sample, is_training: bool) {
        self.store.add_sample(sample, is_training);
    }

    pub fn add_samples<I>(&self, samples: I, is_training: bool) -> usize
    where
        I: IntoIterator<Item = Sample>,
    {
        self.store.add_samples(samples, is_training)
    }

    pub fn train_count(&self) -> usize {
        self.store.train_count()
    }

    pub fn test_count(&self) -> usize {
        self.store.test_count()
    }

    fn invoke(
        &self,
        signature: &'static str,
        inputs: &TensorMap,
        outputs: &mut TensorMap,
    ) -> Result<()> {
        self.engine
            .lock()
            .run_signature(signature, inputs, outputs)
            .map_err(|source| EngineErr::Invocation { signature, source })
    }

    /// Reads the model's current weights.
    pub fn get_parameters(&self) -> Result<WeightSet> {
        let inputs = TensorMap::marked_non_empty();
        let mut outputs = self.codec.empty_map();

        self.invoke(signature::PARAMETERS, &inputs, &mut outputs)?;
        self.codec.decode(outputs)
    }

    /// Replaces the model's weights.
    ///
    /// # Arguments
    /// * `weights` - One buffer per layer.
    ///
    /// # Returns
    /// The weights the engine reports after applying them.
    pub fn update_parameters(&self, weights: WeightSet) -> Result<WeightSet> {
        let inputs = self.codec.encode(weights)?;
        let mut outputs = self.codec.empty_map();

        self.invoke(signature::RESTORE, &inputs, &mut outputs)?;
        self.codec.decode(outputs)
    }

    /// Trains the model over the training samples.
    ///
    /// See `fit_cancellable`, this version can't be interrupted.
    pub fn fit(
        &self,
        epochs: usize,
        batch_size: usize,
        progress: Option<&ProgressTx>,
    ) -> Result<Vec<f32>> {
        self.fit_cancellable(epochs, batch_size, progress, &CancellationToken::new())
    }

    /// Trains the model over the training samples, stopping early if `cancel` fires.
    ///
    /// The training collection stays locked for the whole call. Every epoch
    /// shuffles it and runs `train` over trailing windows of `batch_size`
    /// samples. The token is only looked at before starting an epoch, epochs
    /// already completed are kept.
    ///
    /// # Arguments
    /// * `epochs` - The amount of epochs to run.
    /// * `batch_size` - Samples per batch, clamped to the amount of samples.
    /// * `progress` - Receives one `EpochProgress` per completed epoch.
    /// * `cancel` - Cooperative cancellation.
    ///
    /// # Returns
    /// The mean loss of every completed epoch, or a single NaN if there are no
    /// training samples.
    pub fn fit_cancellable(
        &self,
        epochs: usize,
        batch_size: usize,
        progress: Option<&ProgressTx>,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        let mut samples = self.store.write_train();

        if samples.is_empty() {
            warn!("fit requested without training samples");
            let losses = vec![f32::NAN];
            progress::report(
                progress,
                EpochProgress {
                    epoch: 1,
                    losses: losses.clone(),
                },
            );
            return Ok(losses);
        }

        // `epochs` is coordinator supplied, don't size anything by it.
        let mut means = Vec::new();
        for epoch in 1..=epochs {
            if cancel.is_cancelled() {
                info!(completed = means.len(), requested = epochs; "fit cancelled");
                break;
            }

            samples.shuffle(&mut *self.rng.lock());

            let losses = trailing_windows(samples.len(), batch_size)
                .map(|window| self.train_batch(&samples[window]))
                .collect::<Result<Vec<_>>>()?;

            let mean = progress::mean(&losses);
            debug!(epoch = epoch, batches = losses.len(), mean = mean; "epoch finished");

            progress::report(progress, EpochProgress { epoch, losses });
            means.push(mean);
        }

        Ok(means)
    }

    fn train_batch(&self, batch: &[Sample]) -> Result<f32> {
        let features: Vec<&[f32]> = batch.iter().map(Sample::features).collect();
        let labels: Vec<&[f32]> = batch.iter().map(Sample::label).collect();

        let mut inputs = TensorMap::new();
        inputs.insert(tensor::X, self.spec.encode_features(&features));
        inputs.insert(tensor::Y, self.spec.encode_labels(&labels));

        let mut outputs = TensorMap::new();
        outputs.insert(tensor::LOSS, codec::zeroed(size_of::<f32>()));

        self.invoke(signature::TRAIN, &inputs, &mut outputs)?;
        read_loss(&outputs)
    }

    /// Scores the model over the test samples.
    ///
    /// The test collection is read locked for the whole call.
    ///
    /// # Returns
    /// `(loss, accuracy)`, both NaN if there are no test samples.
    pub fn evaluate(&self) -> Result<(f32, f32)> {
        let samples = self.store.read_test();

        if samples.is_empty() {
            warn!("evaluate requested without test samples");
            return Ok((f32::NAN, f32::NAN));
        }

        let features: Vec<&[f32]> = samples.iter().map(Sample::features).collect();
        let logits = self.inference(&features)?;

        let loss = self.spec.loss(&samples, &logits);
        let accuracy = self.spec.accuracy(&samples, &logits);
        debug!(samples = samples.len(), loss = loss, accuracy = accuracy; "evaluation finished");

        Ok((loss, accuracy))
    }

    /// Runs the model over a batch of feature vectors.
    ///
    /// No sample lock is taken.
    ///
    /// # Returns
    /// The raw `logits` bytes the engine wrote.
    pub fn inference(&self, features: &[&[f32]]) -> Result<Vec<u8>> {
        let mut inputs = TensorMap::new();
        inputs.insert(tensor::X, self.spec.encode_features(features));

        let mut outputs = TensorMap::new();
        outputs.insert(tensor::LOGITS, self.spec.empty_y(features.len()));

        self.invoke(signature::INFER, &inputs, &mut outputs)?;

        outputs
            .remove(tensor::LOGITS)
            .map(Cursor::into_inner)
            .ok_or_else(|| EngineErr::MalformedOutput {
                signature: signature::INFER,
                detail: format!("missing `{}` tensor", tensor::LOGITS),
            })
    }
}

impl std::fmt::Debug for TrainingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingEngine")
            .field("store", &self.store)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

fn read_loss(outputs: &TensorMap) -> Result<f32> {
    let malformed = |detail: String| EngineErr::MalformedOutput {
        signature: signature::TRAIN,
        detail,
    };

    let bytes = outputs
        .get(tensor::LOSS)
        .map(|t| t.get_ref().as_slice())
        .ok_or_else(|| malformed(format!("missing `{}` tensor", tensor::LOSS)))?;

    let raw: [u8; 4] = bytes
        .get(..size_of::<f32>())
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| malformed(format!("`loss` holds {} bytes", bytes.len())))?;

    Ok(f32::from_le_bytes(raw))
}
