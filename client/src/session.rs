use std::sync::Arc;

use comms::{
    FitConfig, OnoReceiver, OnoSender, Parameters,
    msg::{ClientMsg, ServerMsg},
};
use engine::{ProgressRx, TrainingEngine, progress_channel};
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    ProtocolErr, Result,
    event::{self, EventTx, Instruction, SessionEvent},
};

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next instruction.
    Open,
    /// Reconnect received or an error happened, nothing else will be read.
    Closed,
}

/// Serves the coordinator's instructions over one stream.
///
/// Instructions are handled strictly one at a time: the next frame is only
/// read once the reply to the current one was written.
pub struct Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
    engine: Arc<TrainingEngine>,
    events: Option<EventTx>,
    state: SessionState,
    rx_buf: Vec<u8>,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new open `Session`.
    ///
    /// # Arguments
    /// * `rx` - Receiving end of the coordinator channel.
    /// * `tx` - Sending end of the coordinator channel.
    /// * `engine` - The local training engine.
    pub fn new(rx: OnoReceiver<R>, tx: OnoSender<W>, engine: Arc<TrainingEngine>) -> Self {
        Self {
            rx,
            tx,
            engine,
            events: None,
            state: SessionState::Open,
            rx_buf: Vec::new(),
        }
    }

    /// Reports the session's progress through `events`.
    pub fn with_events(mut self, events: EventTx) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handles instructions until the session closes.
    ///
    /// # Returns
    /// `Ok(())` after a reconnect instruction.
    ///
    /// # Errors
    /// The error that closed the session.
    pub async fn run(mut self) -> Result<()> {
        info!("session open");

        while self.step().await? == SessionState::Open {}

        info!("session closed");
        Ok(())
    }

    /// Reads and handles a single instruction.
    ///
    /// Any error closes the session: the stream is shut down and no reply is
    /// sent for the failed instruction.
    ///
    /// # Returns
    /// The state after handling it.
    pub async fn step(&mut self) -> Result<SessionState> {
        if self.state == SessionState::Closed {
            return Ok(SessionState::Closed);
        }

        let mut buf = std::mem::take(&mut self.rx_buf);
        let result = self.next_instruction(&mut buf).await;
        self.rx_buf = buf;

        match result {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(e) => {
                error!("session failed: {e}");
                self.state = SessionState::Closed;
                self.emit(SessionEvent::Failed(e.to_string()));
                if let Err(close_err) = self.tx.close().await {
                    debug!("couldn't shut the stream down: {close_err}");
                }
                Err(e)
            }
        }
    }

    async fn next_instruction(&mut self, buf: &mut Vec<u8>) -> Result<SessionState> {
        let msg: ServerMsg = self.rx.recv_into(buf).await?;
        debug!(kind = msg.kind(); "instruction received");

        match msg {
            ServerMsg::GetParameters => {
                self.emit(SessionEvent::Handling(Instruction::GetParameters));
                self.get_parameters().await?;
            }
            ServerMsg::Fit { parameters, config } => {
                self.emit(SessionEvent::Handling(Instruction::Fit));
                self.fit(parameters, FitConfig::from_config(&config)).await?;
            }
            ServerMsg::Evaluate { parameters, .. } => {
                self.emit(SessionEvent::Handling(Instruction::Evaluate));
                self.evaluate(parameters).await?;
            }
            ServerMsg::Reconnect(reconnect) => {
                info!("reconnect requested (seconds: {:?}), closing", reconnect.seconds);
                self.emit(SessionEvent::Handling(Instruction::Reconnect));
                self.tx.close().await?;
                self.emit(SessionEvent::Closed);
                return Ok(SessionState::Closed);
            }
            ServerMsg::Unknown(kind) => {
                warn!(kind = kind; "unknown instruction");
                return Err(ProtocolErr::Unreachable { kind }.into());
            }
        }

        Ok(SessionState::Open)
    }

    async fn get_parameters(&mut self) -> Result<()> {
        let weights = run_blocking(&self.engine, |engine| engine.get_parameters()).await?;

        let reply = ClientMsg::GetParametersRes {
            parameters: Parameters::new(&weights),
        };
        self.reply(Instruction::GetParameters, &reply).await
    }

    async fn fit(&mut self, parameters: Parameters<'_>, config: FitConfig) -> Result<()> {
        let weights = parameters.to_owned_layers();
        let epochs = config.local_epochs.get();
        let batch_size = config.batch_size.get();
        info!(epochs = epochs, batch_size = batch_size; "local fit");

        let (progress_tx, progress_rx) = progress_channel();
        let training = run_blocking(&self.engine, move |engine| {
            engine.update_parameters(weights)?;
            engine.fit(epochs, batch_size, Some(&progress_tx))?;
            let weights = engine.get_parameters()?;
            Ok((weights, engine.train_count()))
        });

        // Every epoch event is out before the reply.
        let forwarding = forward_progress(progress_rx, self.events.clone());
        let (trained, ()) = tokio::join!(training, forwarding);
        let (weights, num_examples) = trained?;

        let reply = ClientMsg::FitRes {
            parameters: Parameters::new(&weights),
            num_examples: num_examples as i64,
        };
        self.reply(Instruction::Fit, &reply).await
    }

    async fn evaluate(&mut self, parameters: Parameters<'_>) -> Result<()> {
        let weights = parameters.to_owned_layers();

        // Counted off the runtime, the test lock may be held by someone else.
        let (loss, accuracy, num_examples) = run_blocking(&self.engine, move |engine| {
            engine.update_parameters(weights)?;
            let (loss, accuracy) = engine.evaluate()?;
            Ok((loss, accuracy, engine.test_count()))
        })
        .await?;

        info!(loss = loss, accuracy = accuracy; "local evaluation");
        self.emit(SessionEvent::Evaluated { loss, accuracy });

        let reply = ClientMsg::EvaluateRes {
            loss,
            num_examples: num_examples as i64,
        };
        self.reply(Instruction::Evaluate, &reply).await
    }

    async fn reply(&mut self, instruction: Instruction, msg: &ClientMsg<'_>) -> Result<()> {
        self.tx.send(msg).await?;
        debug!(kind = msg.kind(); "reply sent");
        self.emit(SessionEvent::ReplySent(instruction));
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        event::emit(self.events.as_ref(), event);
    }
}

/// Runs `f` on tokio's blocking pool so training never stalls the runtime.
async fn run_blocking<T, F>(engine: &Arc<TrainingEngine>, f: F) -> Result<T>
where
    F: FnOnce(&TrainingEngine) -> engine::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(engine);
    let out = tokio::task::spawn_blocking(move || f(&engine)).await??;
    Ok(out)
}

async fn forward_progress(mut progress: ProgressRx, events: Option<EventTx>) {
    while let Some(epoch) = progress.recv().await {
        info!(epoch = epoch.epoch, mean_loss = epoch.mean(); "epoch done");
        event::emit(
            events.as_ref(),
            SessionEvent::Epoch {
                epoch: epoch.epoch,
                mean_loss: epoch.mean(),
            },
        );
    }
}
