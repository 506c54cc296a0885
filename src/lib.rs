//! Gemini tutor
//!
//! Three usage patterns of the Gemini API: multi-turn chat with sampling
//! parameters, a function-calling loop driven by a pure state machine, and
//! text embeddings. The model service sits behind [`llm::ModelService`] so
//! every feature runs against a mock in tests.

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod llm;
pub mod runtime;
pub mod state_machine;
pub mod tools;
