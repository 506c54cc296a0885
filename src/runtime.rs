//! Runtime for driving the function-calling loop
//!
//! The runtime owns the loop state. Commands arrive over a channel and are
//! acknowledged once their transition is applied; model calls run on
//! background tasks and report back as events.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::LoopRuntime;

use crate::llm::{ModelService, Turn};
use crate::state_machine::{LoopState, TransitionError};
use crate::tools::{Scenario, SchemaError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// User-initiated actions
#[derive(Debug, Clone)]
pub enum Command {
    Start { prompt: String },
    Reply { text: String },
    ApplyPreset { scenario: Scenario },
    EditDraft { draft: String },
    SubmitResult { raw: String },
    /// Replace the editable tool definitions text
    SetToolDefinitions { raw: String },
    Reset,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error(transparent)]
    ToolDefinitions(#[from] SchemaError),
    #[error("Interaction loop has stopped")]
    Stopped,
}

/// Events sent to subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged { phase: &'static str },
    TurnAppended { index: usize, turn: Turn },
    Failed { message: String },
}

pub(crate) type CommandEnvelope = (Command, oneshot::Sender<Result<(), CommandError>>);

/// Handle to interact with a running loop
#[derive(Clone)]
pub struct LoopHandle {
    session_id: String,
    command_tx: mpsc::Sender<CommandEnvelope>,
    state_rx: watch::Receiver<LoopState>,
    tools_rx: watch::Receiver<String>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl LoopHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a command and wait until its transition has been applied
    ///
    /// Returns before any model request the command issued completes; use
    /// [`LoopHandle::settled`] to wait for that.
    pub async fn dispatch(&self, command: Command) -> Result<(), CommandError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.command_tx
            .send((command, ack_tx))
            .await
            .map_err(|_| CommandError::Stopped)?;
        ack_rx.await.map_err(|_| CommandError::Stopped)?
    }

    /// Current state
    pub fn snapshot(&self) -> LoopState {
        self.state_rx.borrow().clone()
    }

    /// Wait until no model request is in flight
    pub async fn settled(&self) -> Result<LoopState, CommandError> {
        let mut state_rx = self.state_rx.clone();
        let state = state_rx
            .wait_for(|state| !state.is_busy())
            .await
            .map_err(|_| CommandError::Stopped)?;
        Ok(state.clone())
    }

    /// Raw tool definitions text currently in effect
    pub fn tool_definitions(&self) -> String {
        self.tools_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }
}

/// Start a loop on the current tokio runtime
///
/// `tool_definitions` is not validated here; bad definitions surface when a
/// command needs them.
pub fn spawn_loop<M>(service: Arc<M>, tool_definitions: impl Into<String>) -> LoopHandle
where
    M: ModelService + ?Sized + 'static,
{
    let session_id = uuid::Uuid::new_v4().to_string();
    let (command_tx, command_rx) = mpsc::channel(32);
    let (state_tx, state_rx) = watch::channel(LoopState::default());
    let (tools_tx, tools_rx) = watch::channel(tool_definitions.into());
    let (broadcast_tx, _) = broadcast::channel(128);

    let runtime = LoopRuntime::new(
        session_id.clone(),
        service,
        command_rx,
        state_tx,
        tools_tx,
        broadcast_tx.clone(),
    );
    tokio::spawn(runtime.run());

    LoopHandle {
        session_id,
        command_tx,
        state_rx,
        tools_rx,
        broadcast_tx,
    }
}
