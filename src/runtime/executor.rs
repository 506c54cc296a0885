//! Loop runtime executor

use super::{Command, CommandEnvelope, CommandError, SessionEvent};
use crate::llm::ModelService;
use crate::state_machine::{
    transition, Effect, Event, LoopState, ModelCall, RequestId, TransitionError,
};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Single-session runtime that executes state machine effects
pub struct LoopRuntime<M: ModelService + ?Sized + 'static> {
    session_id: String,
    state: LoopState,
    service: Arc<M>,
    command_rx: mpsc::Receiver<CommandEnvelope>,
    /// Completions from background model calls
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    state_tx: watch::Sender<LoopState>,
    tools_tx: watch::Sender<String>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl<M: ModelService + ?Sized + 'static> LoopRuntime<M> {
    pub fn new(
        session_id: String,
        service: Arc<M>,
        command_rx: mpsc::Receiver<CommandEnvelope>,
        state_tx: watch::Sender<LoopState>,
        tools_tx: watch::Sender<String>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        Self {
            session_id,
            state: LoopState::default(),
            service,
            command_rx,
            event_rx,
            event_tx,
            state_tx,
            tools_tx,
            broadcast_tx,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting interaction loop");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    // All handles dropped
                    let Some((command, ack)) = command else { break };
                    let outcome = self.handle_command(command);
                    if let Err(e) = &outcome {
                        tracing::warn!(session_id = %self.session_id, error = %e, "Command rejected");
                    }
                    let _ = ack.send(outcome);
                }
                Some(event) = self.event_rx.recv() => {
                    self.handle_completion(event);
                }
            }
        }

        tracing::info!(session_id = %self.session_id, "Interaction loop stopped");
    }

    fn handle_command(&mut self, command: Command) -> Result<(), CommandError> {
        let issues_request = matches!(
            command,
            Command::Start { .. } | Command::Reply { .. } | Command::SubmitResult { .. }
        );
        // Busy outranks broken definitions
        if issues_request && self.state.is_busy() {
            return Err(TransitionError::Busy.into());
        }
        let event = match command {
            Command::Start { prompt } => Event::Start {
                prompt,
                tools: self.current_tools()?,
            },
            Command::Reply { text } => Event::SendReply {
                text,
                tools: self.current_tools()?,
            },
            Command::SubmitResult { raw } => Event::SubmitToolResult {
                raw,
                tools: self.current_tools()?,
            },
            Command::ApplyPreset { scenario } => Event::ApplyPreset { scenario },
            Command::EditDraft { draft } => Event::EditDraft { draft },
            Command::Reset => Event::Reset,
            Command::SetToolDefinitions { raw } => {
                let registry = ToolRegistry::parse(&raw)?;
                tracing::info!(count = registry.len(), "Tool definitions updated");
                self.tools_tx.send_replace(raw);
                return Ok(());
            }
        };
        self.apply(event)?;
        Ok(())
    }

    /// Tools are parsed afresh for every request-issuing command
    fn current_tools(&self) -> Result<Vec<crate::tools::ToolDescriptor>, CommandError> {
        let raw = self.tools_tx.borrow().clone();
        Ok(ToolRegistry::parse(&raw)?.into_vec())
    }

    fn handle_completion(&mut self, event: Event) {
        let answered = event.answers();
        let in_flight = self.state.in_flight_request();
        if answered != in_flight {
            tracing::debug!(
                session_id = %self.session_id,
                answered = ?answered,
                in_flight = ?in_flight,
                "Discarding stale model response"
            );
        }
        if let Err(e) = self.apply(event) {
            tracing::error!(error = %e, "Error handling model completion");
        }
    }

    fn apply(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, event)?;

        let changed = result.new_state != self.state;
        if changed {
            let from = self.state.phase.name();
            self.state = result.new_state;
            tracing::debug!(from, to = self.state.phase.name(), "Loop state changed");
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }

        // Published last so watchers never see a state whose events are unsent
        if changed {
            self.state_tx.send_replace(self.state.clone());
        }
        Ok(())
    }

    fn execute_effect(&self, effect: Effect) {
        match effect {
            Effect::RequestModel { request_id, call } => self.spawn_request(request_id, call),
            Effect::NotifyTurn { index, turn } => {
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::TurnAppended { index, turn });
            }
            Effect::NotifyStateChange => {
                let _ = self.broadcast_tx.send(SessionEvent::StateChanged {
                    phase: self.state.phase.name(),
                });
            }
            Effect::NotifyFailure { message } => {
                tracing::warn!(session_id = %self.session_id, error = %message, "Interaction loop finished with error");
                let _ = self.broadcast_tx.send(SessionEvent::Failed { message });
            }
        }
    }

    /// Run the model call in the background; the loop keeps taking commands
    fn spawn_request(&self, request_id: RequestId, call: ModelCall) {
        let service = self.service.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            tracing::info!(request_id, "Making model request (background)");

            let outcome = match &call {
                ModelCall::Message {
                    history,
                    message,
                    tools,
                } => service.complete_with_tools(history, message, tools).await,
                ModelCall::ToolResult {
                    history,
                    tool_name,
                    result,
                    tools,
                } => {
                    service
                        .submit_tool_result(history, tool_name, result, tools)
                        .await
                }
            };

            let event = match outcome {
                Ok(response) => Event::ModelReplied {
                    request_id,
                    response,
                },
                Err(error) => Event::ModelFailed { request_id, error },
            };
            let _ = event_tx.send(event).await;
        });
    }
}
