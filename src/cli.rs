//! Command-line interface
//!
//! Each subcommand is a small line-oriented REPL over one feature.

mod chat;
mod embed;
mod tools;

use crate::config::{ModelConfig, ServiceConfig};
use crate::llm::{GeminiService, LoggingService, ModelService, Turn, TurnPayload};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "gemini-tutor")]
#[command(
    about = "Walk through chat, function calling and embeddings against the Gemini API."
)]
pub struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Chat model (overrides GEMINI_MODEL)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// API base URL (overrides GEMINI_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Multi-turn chat with adjustable sampling parameters
    Chat {
        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        top_k: Option<u32>,

        #[arg(long)]
        top_p: Option<f64>,

        #[arg(long)]
        max_output_tokens: Option<u32>,

        /// System instruction
        #[arg(long)]
        system: Option<String>,
    },
    /// Function-calling loop with hand-mocked tool results
    Tools {
        /// JSON file of function declarations (default: built-in GPU and email tools)
        #[arg(long)]
        tools: Option<PathBuf>,

        /// Start immediately with this prompt
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Embed text and summarize the vector
    Embed {
        text: String,

        /// Also embed this text and print the cosine similarity
        #[arg(long)]
        compare: Option<String>,

        /// Print every value instead of a preview
        #[arg(long)]
        full: bool,
    },
}

impl Command {
    /// Sampling parameters from the chat flags
    fn model_config(&self) -> Result<ModelConfig, crate::config::ConfigError> {
        let mut config = ModelConfig::default();
        if let Command::Chat {
            temperature,
            top_k,
            top_p,
            max_output_tokens,
            system,
        } = self
        {
            if let Some(v) = temperature {
                config.temperature = *v;
            }
            if let Some(v) = top_k {
                config.top_k = *v;
            }
            if let Some(v) = top_p {
                config.top_p = *v;
            }
            if let Some(v) = max_output_tokens {
                config.max_output_tokens = *v;
            }
            if let Some(v) = system {
                config.system_instruction.clone_from(v);
            }
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> CliResult {
    let mut config = ServiceConfig::from_env()?;
    if let Some(model) = cli.model {
        config.chat_model = model;
    }
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    let api_key = config.require_api_key()?.to_string();

    let service: Arc<dyn ModelService> =
        Arc::new(LoggingService::new(GeminiService::new(api_key, &config)?));
    tracing::info!(
        chat_model = %config.chat_model,
        embedding_model = %config.embedding_model,
        "Model service ready"
    );

    match &cli.command {
        Command::Chat { .. } => chat::run(service, cli.command.model_config()?).await,
        Command::Tools {
            tools: tools_file,
            prompt,
        } => tools::run(service, tools_file.as_deref(), prompt.clone()).await,
        Command::Embed {
            text,
            compare,
            full,
        } => embed::run(service.as_ref(), text, compare.as_deref(), *full).await,
    }
}

/// One history line, as printed by the REPLs
fn render_turn(index: usize, turn: &Turn) -> String {
    let body = match &turn.payload {
        TurnPayload::Text { text } => text.clone(),
        TurnPayload::ToolCall { name, arguments } => format!("{name}({arguments})"),
        TurnPayload::ToolResult { name, result } => format!("{name} -> {result}"),
    };
    format!("[{index}] {}: {body}", turn.label())
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
