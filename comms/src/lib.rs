pub mod config;
pub mod msg;
mod params;
mod protocol;
mod receiver;
mod sender;
mod wire;

use tokio::io::{AsyncRead, AsyncWrite};

pub use config::{ConfigMap, FitConfig, Scalar};
pub use params::{Parameters, TENSOR_TYPE};
pub use receiver::OnoReceiver;
pub use sender::OnoSender;
pub use wire::{Deserialize, Serialize};

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// The default upper bound for a single incoming frame, 100 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Creates both `OnoReceiver` and `OnoSender` network channel parts.
///
/// Given a writer and reader creates and returns both ends of the communication.
///
/// # Arguments
/// * `rx` - An async readable.
/// * `tx` - An async writable.
///
/// # Returns
/// A communication stream in the form of an ono receiver and sender.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
