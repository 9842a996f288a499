//! The client side of a federated-learning round.
//!
//! There is no binary: the model is supplied by whoever embeds the crate. The
//! embedding app initializes its logger, builds a `TrainingEngine` around its
//! `InferenceEngine`, reads a `ClientConfig` (usually `ClientConfig::from_env`)
//! and hands both to `run`.

mod config;
mod error;
pub mod event;
mod session;

use std::sync::Arc;

use comms::{OnoReceiver, OnoSender};
use engine::TrainingEngine;
use log::info;
use tokio::net::{
    TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

pub use config::{ClientConfig, DEFAULT_HOST, DEFAULT_LAYER_SIZES, DEFAULT_MAX_MESSAGE_SIZE};
pub use error::{ClientErr, ProtocolErr, Result};
pub use event::{EventRx, EventTx, Instruction, SessionEvent, event_channel};
pub use session::{Session, SessionState};

/// Opens the stream to the coordinator.
///
/// # Arguments
/// * `config` - The coordinator's address and the frame size limit.
///
/// # Returns
/// Both ends of the channel.
pub async fn connect(
    config: &ClientConfig,
) -> Result<(OnoReceiver<OwnedReadHalf>, OnoSender<OwnedWriteHalf>)> {
    let stream = TcpStream::connect(&config.server_addr).await?;
    info!("connected to the coordinator at {}", config.server_addr);

    let (rx, tx) = stream.into_split();
    let (rx, tx) = comms::channel(rx, tx);
    Ok((rx.with_max_frame_size(config.max_message_size), tx))
}

/// Connects to the coordinator and serves it until it asks to reconnect.
///
/// # Arguments
/// * `config` - The client configuration.
/// * `engine` - The local training engine, built for `config.layer_sizes`.
/// * `events` - Where to report progress, if anywhere.
///
/// # Errors
/// `InvalidConfig` if the engine's layers disagree with `config`, otherwise
/// whatever closed the session.
pub async fn run(
    config: &ClientConfig,
    engine: Arc<TrainingEngine>,
    events: Option<EventTx>,
) -> Result<()> {
    if engine.codec().layer_sizes() != config.layer_sizes.as_slice() {
        return Err(ClientErr::InvalidConfig {
            key: "layer_sizes",
            detail: format!(
                "the engine has layers {:?} but {:?} are configured",
                engine.codec().layer_sizes(),
                config.layer_sizes
            ),
        });
    }

    let (rx, tx) = connect(config).await?;

    let mut session = Session::new(rx, tx, engine);
    if let Some(events) = events {
        session = session.with_events(events);
    }

    session.run().await
}
