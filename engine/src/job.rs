use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Result, TrainingEngine, progress::ProgressTx};

/// A `fit` running on the blocking pool.
///
/// Dropping the job detaches it, the fit still runs to completion.
#[derive(Debug)]
pub struct FitJob {
    handle: JoinHandle<Result<Vec<f32>>>,
    cancel: CancellationToken,
}

impl FitJob {
    /// Asks the fit to stop before its next epoch.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this job when fired.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the fit to finish.
    ///
    /// # Returns
    /// The mean loss of every completed epoch.
    pub async fn join(self) -> Result<Vec<f32>> {
        self.handle.await?
    }
}

impl TrainingEngine {
    /// Starts `fit_cancellable` on tokio's blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    /// * `epochs` - The amount of epochs to run.
    /// * `batch_size` - Samples per batch.
    /// * `progress` - Receives one `EpochProgress` per completed epoch.
    ///
    /// # Returns
    /// The handle owning the task and its cancellation token.
    pub fn spawn_fit(
        self: &Arc<Self>,
        epochs: usize,
        batch_size: usize,
        progress: Option<ProgressTx>,
    ) -> FitJob {
        let engine = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::task::spawn_blocking(move || {
            engine.fit_cancellable(epochs, batch_size, progress.as_ref(), &token)
        });

        FitJob { handle, cancel }
    }
}
