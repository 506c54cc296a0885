//! `tools` subcommand

use super::{pretty, render_turn, CliResult};
use crate::config::read_tool_definitions;
use crate::llm::ModelService;
use crate::runtime::{spawn_loop, Command, LoopHandle, SessionEvent};
use crate::state_machine::{LoopState, Phase};
use crate::tools::{Scenario, ToolRegistry, DEFAULT_TOOL_DEFINITIONS};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

const HELP: &str = "Commands: /preset <success|failure|error>, /edit <json>, /submit [json], \
/history, /json, /tools, /load <file>, /reset, /quit. Plain text starts the conversation or replies.";

#[derive(Debug, PartialEq)]
enum ToolsInput<'a> {
    Text(&'a str),
    Preset(Result<Scenario, String>),
    Edit(&'a str),
    Submit(Option<&'a str>),
    History,
    Json,
    Tools,
    Load(&'a str),
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> ToolsInput<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return ToolsInput::Text(line);
    };
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();
    match name {
        "preset" => ToolsInput::Preset(rest.parse()),
        "edit" if !rest.is_empty() => ToolsInput::Edit(rest),
        "submit" => ToolsInput::Submit((!rest.is_empty()).then_some(rest)),
        "history" => ToolsInput::History,
        "json" => ToolsInput::Json,
        "tools" => ToolsInput::Tools,
        "load" if !rest.is_empty() => ToolsInput::Load(rest),
        "reset" => ToolsInput::Reset,
        "help" => ToolsInput::Help,
        "quit" | "exit" => ToolsInput::Quit,
        _ => ToolsInput::Unknown(line),
    }
}

/// Map plain text onto the action the current phase accepts
fn text_command(state: &LoopState, text: &str) -> Command {
    match state.phase {
        Phase::AwaitingUserReply => Command::Reply {
            text: text.to_string(),
        },
        _ => Command::Start {
            prompt: text.to_string(),
        },
    }
}

/// Context history as sent on the wire, then the last raw request and response
fn json_view(state: &LoopState) -> String {
    let history = serde_json::to_value(&state.history).unwrap_or_default();
    let mut out = format!("context history:\n{}\n", pretty(&history));
    match &state.last_exchange {
        Some(exchange) => {
            out.push_str(&format!("last request:\n{}\n", pretty(&exchange.request)));
            out.push_str(&format!("last response:\n{}\n", pretty(&exchange.response)));
        }
        None => out.push_str("(no model response yet)\n"),
    }
    out.push_str(&format!(
        "tokens: {} in, {} out",
        state.usage.input_tokens, state.usage.output_tokens
    ));
    out
}

fn print_tools(raw: &str) {
    match ToolRegistry::parse(raw) {
        Ok(registry) => {
            for tool in registry.iter() {
                println!("  {} - {}", tool.signature(), tool.description());
            }
        }
        Err(e) => println!("error> {e}"),
    }
}

/// Print whatever happened since the last prompt, then what to do next
fn report(events: &mut broadcast::Receiver<SessionEvent>, state: &LoopState) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::TurnAppended { index, turn } => println!("{}", render_turn(index, &turn)),
            SessionEvent::Failed { message } => println!("error> {message} (use /reset to start over)"),
            SessionEvent::StateChanged { .. } => {}
        }
    }
    if let Some(pending) = state.pending_call() {
        println!(
            "Model wants {}({}). Suggested result:",
            pending.call.name, pending.call.arguments
        );
        println!("{}", pending.draft);
        println!("/submit to send it, /preset or /edit to change it.");
    }
}

async fn dispatch(
    handle: &LoopHandle,
    events: &mut broadcast::Receiver<SessionEvent>,
    command: Command,
) -> CliResult {
    let issues_request = matches!(
        command,
        Command::Start { .. } | Command::Reply { .. } | Command::SubmitResult { .. }
    );
    if let Err(e) = handle.dispatch(command).await {
        println!("error> {e}");
        return Ok(());
    }
    let state = if issues_request {
        println!("(waiting for model...)");
        handle.settled().await?
    } else {
        handle.snapshot()
    };
    report(events, &state);
    Ok(())
}

pub(super) async fn run(
    service: Arc<dyn ModelService>,
    tools_file: Option<&Path>,
    prompt: Option<String>,
) -> CliResult {
    let definitions = match tools_file {
        Some(path) => read_tool_definitions(path)?,
        None => DEFAULT_TOOL_DEFINITIONS.to_string(),
    };
    let handle = spawn_loop(service, definitions);
    let mut events = handle.subscribe();
    tracing::debug!(session_id = %handle.session_id(), "Function-calling session started");

    println!("Function calling demo. {HELP}");
    print_tools(&handle.tool_definitions());

    if let Some(prompt) = prompt {
        dispatch(&handle, &mut events, Command::Start { prompt }).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_input(&line) {
            ToolsInput::Text("") => continue,
            ToolsInput::Text(text) => text_command(&handle.snapshot(), text),
            ToolsInput::Preset(Ok(scenario)) => Command::ApplyPreset { scenario },
            ToolsInput::Preset(Err(e)) => {
                println!("error> {e}");
                continue;
            }
            ToolsInput::Edit(draft) => Command::EditDraft {
                draft: draft.to_string(),
            },
            ToolsInput::Submit(raw) => {
                let raw = match raw {
                    Some(raw) => raw.to_string(),
                    None => match handle.snapshot().pending_call() {
                        Some(pending) => pending.draft.clone(),
                        None => {
                            println!("error> No tool call is waiting for a result.");
                            continue;
                        }
                    },
                };
                Command::SubmitResult { raw }
            }
            ToolsInput::History => {
                let state = handle.snapshot();
                for (index, turn) in state.history.iter().enumerate() {
                    println!("{}", render_turn(index, turn));
                }
                println!("state: {}", state.phase.name());
                if let Some(error) = state.error() {
                    println!("error: {error}");
                }
                continue;
            }
            ToolsInput::Json => {
                println!("{}", json_view(&handle.snapshot()));
                continue;
            }
            ToolsInput::Tools => {
                print_tools(&handle.tool_definitions());
                continue;
            }
            ToolsInput::Load(path) => match read_tool_definitions(Path::new(path)) {
                Ok(raw) => Command::SetToolDefinitions { raw },
                Err(e) => {
                    println!("error> {e}");
                    continue;
                }
            },
            ToolsInput::Reset => Command::Reset,
            ToolsInput::Help => {
                println!("{HELP}");
                continue;
            }
            ToolsInput::Quit => break,
            ToolsInput::Unknown(input) => {
                println!("Unknown command `{input}`. {HELP}");
                continue;
            }
        };
        dispatch(&handle, &mut events, command).await?;
    }

    let state = handle.snapshot();
    tracing::debug!(
        turns = state.history.len(),
        state = state.phase.name(),
        "Function-calling session ended"
    );
    Ok(())
}
