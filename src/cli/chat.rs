//! `chat` subcommand

use super::{pretty, render_turn, CliResult};
use crate::chat::{ChatError, ChatSession};
use crate::config::ModelConfig;
use crate::llm::ModelService;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /config [key value], /log, /history, /reset, /quit. Anything else is sent to the model.";

#[derive(Debug, PartialEq)]
enum ChatInput<'a> {
    Message(&'a str),
    ShowConfig,
    SetConfig { key: &'a str, value: &'a str },
    Log,
    History,
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> ChatInput<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Message(line);
    };
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    match name {
        "config" => match rest.trim().split_once(' ') {
            Some((key, value)) => ChatInput::SetConfig { key, value },
            None if rest.trim().is_empty() => ChatInput::ShowConfig,
            None => ChatInput::Unknown(line),
        },
        "log" => ChatInput::Log,
        "history" => ChatInput::History,
        "reset" => ChatInput::Reset,
        "help" => ChatInput::Help,
        "quit" | "exit" => ChatInput::Quit,
        _ => ChatInput::Unknown(line),
    }
}

fn print_config(config: &ModelConfig) {
    println!(
        "temperature={} top_k={} top_p={} max_output_tokens={}",
        config.temperature, config.top_k, config.top_p, config.max_output_tokens
    );
    println!("system: {}", config.system_instruction);
}

pub(super) async fn run(service: Arc<dyn ModelService>, config: ModelConfig) -> CliResult {
    let mut session = ChatSession::new(config);
    println!("Chat with {}. {HELP}", service.model_id());
    print_config(session.config());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            ChatInput::Message("") => {}
            ChatInput::Message(text) => match session.send(service.as_ref(), text).await {
                Ok(reply) => println!("model> {reply}"),
                Err(ChatError::EmptyMessage) => {}
                Err(e) => println!("error> {e}"),
            },
            ChatInput::ShowConfig => print_config(session.config()),
            ChatInput::SetConfig { key, value } => {
                match session
                    .config()
                    .with_setting(key, value)
                    .and_then(|next| session.set_config(next))
                {
                    Ok(()) => print_config(session.config()),
                    Err(e) => println!("error> {e}"),
                }
            }
            ChatInput::Log => {
                if session.log().is_empty() {
                    println!("(no requests yet)");
                }
                for entry in session.log() {
                    println!(
                        "--- #{} at {} ---",
                        entry.turn_index,
                        entry.timestamp.format("%H:%M:%S")
                    );
                    println!("request:\n{}", pretty(&entry.request));
                    println!("response:\n{}", pretty(&entry.response));
                }
            }
            ChatInput::History => {
                for (index, turn) in session.history().iter().enumerate() {
                    println!("{}", render_turn(index, turn));
                }
            }
            ChatInput::Reset => {
                session.reset();
                println!("Conversation cleared.");
            }
            ChatInput::Help => println!("{HELP}"),
            ChatInput::Quit => break,
            ChatInput::Unknown(input) => println!("Unknown command `{input}`. {HELP}"),
        }
    }

    let usage = session.usage();
    tracing::info!(
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        "Chat session ended"
    );
    Ok(())
}
