mod batching;
pub mod codec;
mod error;
pub mod feed;
mod job;
pub mod progress;
mod sample;
mod sample_spec;
mod training;

pub use batching::{TrailingWindows, trailing_windows};
pub use codec::{ParameterCodec, Tensor, TensorMap, WeightSet};
pub use error::{EngineErr, EngineFault, Result};
pub use job::FitJob;
pub use progress::{EpochProgress, ProgressRx, ProgressTx, progress_channel};
pub use sample::{Sample, SampleStore};
pub use sample_spec::{SampleSpec, pack_f32, unpack_f32};
pub use training::{InferenceEngine, TrainingEngine, signature, tensor};
