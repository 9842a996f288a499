use tokio::sync::mpsc;

/// The sending end of the progress channel handed to `fit`.
pub type ProgressTx = mpsc::UnboundedSender<EpochProgress>;

/// The receiving end of the progress channel.
pub type ProgressRx = mpsc::UnboundedReceiver<EpochProgress>;

/// Creates a new progress channel.
pub fn progress_channel() -> (ProgressTx, ProgressRx) {
    mpsc::unbounded_channel()
}

/// Emitted once after every completed epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochProgress {
    /// One based epoch index.
    pub epoch: usize,
    /// The loss of every batch in the epoch, in the order they ran.
    pub losses: Vec<f32>,
}

impl EpochProgress {
    /// The average of `losses`, NaN if there are none.
    pub fn mean(&self) -> f32 {
        mean(&self.losses)
    }
}

pub(crate) fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }

    values.iter().sum::<f32>() / values.len() as f32
}

/// Sends `progress` if someone is listening.
///
/// A dropped receiver is not an error, the caller simply stopped caring.
pub(crate) fn report(tx: Option<&ProgressTx>, progress: EpochProgress) {
    if let Some(tx) = tx {
        let _ = tx.send(progress);
    }
}
