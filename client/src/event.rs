use std::fmt;

use tokio::sync::mpsc;

/// Sending end of the session's event channel.
pub type EventTx = mpsc::UnboundedSender<SessionEvent>;

/// Receiving end of the session's event channel.
pub type EventRx = mpsc::UnboundedReceiver<SessionEvent>;

/// Creates a new event channel.
pub fn event_channel() -> (EventTx, EventRx) {
    mpsc::unbounded_channel()
}

/// The instructions a session knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    GetParameters,
    Fit,
    Evaluate,
    Reconnect,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instruction::GetParameters => "GetParameters",
            Instruction::Fit => "Fit",
            Instruction::Evaluate => "Evaluate",
            Instruction::Reconnect => "Reconnect",
        };

        f.write_str(name)
    }
}

/// Progress reported by a session while it runs.
///
/// The `Display` impl renders the message meant for whoever is watching.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// An instruction was received and is being handled.
    Handling(Instruction),
    /// A local epoch finished.
    Epoch { epoch: usize, mean_loss: f32 },
    Evaluated { loss: f32, accuracy: f32 },
    ReplySent(Instruction),
    /// The coordinator asked to reconnect, the session is over.
    Closed,
    /// The session ended with an error.
    Failed(String),
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Handling(instruction) => {
                write!(f, "Handling {instruction} request from the server.")
            }
            SessionEvent::Epoch { epoch, mean_loss } => {
                write!(f, "Epoch {epoch} - Average loss: {mean_loss}.")
            }
            SessionEvent::Evaluated { accuracy, .. } => {
                write!(f, "Test Accuracy after this round = {accuracy}")
            }
            SessionEvent::ReplySent(_) => write!(f, "Response sent to the server"),
            SessionEvent::Closed => write!(f, "Disconnected from the server"),
            SessionEvent::Failed(detail) => write!(f, "Session failed: {detail}"),
        }
    }
}

pub(crate) fn emit(events: Option<&EventTx>, event: SessionEvent) {
    if let Some(events) = events {
        let _ = events.send(event);
    }
}
