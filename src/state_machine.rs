//! Function-calling interaction state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! transition function never talks to the model service, it only emits
//! effects for the runtime to execute.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, ModelCall};
pub use event::Event;
pub use state::{LoopState, PendingCall, Phase, RequestId};
pub use transition::{transition, TransitionError, TransitionResult};
