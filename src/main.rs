//! CLI entry point for runstream.

mod cli;
mod cli_event_renderer;

use std::sync::Arc;

use clap::Parser;
use runstream::api::HttpCollaborator;
use runstream::config::{load_config_with_diagnostics, Config};
use runstream::render::{RenderSink, Renderer};
use runstream::runtime::{spawn_orchestrator, RuntimeEventStream, SessionState, TaskOrchestrator};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use cli::{parse_repl_line, ReplCommand};
use cli_event_renderer::{render_help, render_history, render_runtime_event, render_status};

const EXIT_COMPLETED: i32 = 0;
const EXIT_ERRORED: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    init_tracing();
    let args = cli::Args::parse();

    let loaded = match load_config_with_diagnostics(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: failed to load config: {e}");
            std::process::exit(EXIT_USAGE);
        }
    };
    let mut config = loaded.config;
    if let Err(msg) = apply_cli_overrides(&mut config, &args) {
        eprintln!("error: {msg}");
        std::process::exit(EXIT_USAGE);
    }

    let renderer = Renderer::new(config.display.color);
    for warning in &loaded.diagnostics.warnings {
        renderer.warn(warning);
    }

    let remote = Arc::new(HttpCollaborator::new(&config.server, &config.network));
    let (orchestrator, events) = match spawn_orchestrator(remote, &config) {
        Ok(spawned) => spawned,
        Err(e) => {
            renderer.error(&format!("failed to start: {e}"));
            std::process::exit(EXIT_USAGE);
        }
    };

    let code = match args.command {
        Some(cli::Command::Run { repo, command }) => {
            let command = command.join(" ");
            match orchestrator.submit(command, repo).await {
                Ok(_) => drive(&orchestrator, events, &renderer, true).await,
                Err(e) => {
                    renderer.error(&e.to_string());
                    EXIT_USAGE
                }
            }
        }
        None => {
            render_help(&renderer);
            drive(&orchestrator, events, &renderer, false).await
        }
    };

    let _ = orchestrator.shutdown().await;
    std::process::exit(code);
}

/// Log to stderr, filtered by `RUNSTREAM_LOG` (default `warn`).
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("RUNSTREAM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn apply_cli_overrides(config: &mut Config, args: &cli::Args) -> Result<(), String> {
    if let Some(base_url) = &args.base_url {
        let base_url = base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(format!(
                "--base-url must start with http:// or https:// (got `{base_url}`)"
            ));
        }
        config.server.base_url = base_url.to_string();
    }
    if args.no_color {
        config.display.color = false;
    }
    Ok(())
}

fn exit_code_for(state: SessionState) -> i32 {
    match state {
        SessionState::Completed => EXIT_COMPLETED,
        SessionState::Cancelled => EXIT_CANCELLED,
        _ => EXIT_ERRORED,
    }
}

/// Pump runtime events, stdin commands and Ctrl-C until done.
///
/// With `once`, returns as soon as the submitted session finishes; otherwise
/// runs the REPL until `/quit`, end of input or Ctrl-C while idle.
async fn drive(
    orchestrator: &TaskOrchestrator,
    mut events: RuntimeEventStream,
    renderer: &dyn RenderSink,
    once: bool,
) -> i32 {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    if !once {
        renderer.prompt();
    }

    loop {
        tokio::select! {
            envelope = events.recv() => {
                let Some(envelope) = envelope else {
                    renderer.error("runtime stopped unexpectedly");
                    return EXIT_ERRORED;
                };
                if let Some(state) = render_runtime_event(renderer, &envelope.event) {
                    if once {
                        return exit_code_for(state);
                    }
                    renderer.prompt();
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(_) => {
                        stdin_open = false;
                        if once {
                            continue;
                        }
                        let _ = orchestrator.cancel().await;
                        return EXIT_COMPLETED;
                    }
                };
                match parse_repl_line(&line) {
                    None => {}
                    Some(ReplCommand::Quit) if !once => {
                        let _ = orchestrator.cancel().await;
                        return EXIT_COMPLETED;
                    }
                    Some(ReplCommand::Quit) => {
                        let _ = orchestrator.cancel().await;
                    }
                    Some(command) => handle_command(orchestrator, renderer, command).await,
                }
                if !once {
                    renderer.prompt();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                match orchestrator.cancel().await {
                    Ok(true) => {}
                    _ if once => return EXIT_CANCELLED,
                    _ => {
                        eprintln!();
                        return EXIT_CANCELLED;
                    }
                }
            }
        }
    }
}

async fn handle_command(
    orchestrator: &TaskOrchestrator,
    renderer: &dyn RenderSink,
    command: ReplCommand,
) {
    let result = match command {
        ReplCommand::Run { repo, command } => {
            match orchestrator.snapshot().await {
                Ok(snapshot) if snapshot.state.is_live() => {
                    renderer.warn("a session is already running; /cancel it first");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    renderer.error(&e.to_string());
                    return;
                }
            }
            orchestrator.submit(command, repo).await.map(|_| ())
        }
        ReplCommand::Approve => report(renderer, orchestrator.decide(true).await, "no pending approval"),
        ReplCommand::Reject => report(renderer, orchestrator.decide(false).await, "no pending approval"),
        ReplCommand::Edit(text) => {
            report(renderer, orchestrator.edit_action(text).await, "no pending approval to edit")
        }
        ReplCommand::ResetEdit => {
            report(renderer, orchestrator.reset_edit().await, "no pending approval to reset")
        }
        ReplCommand::Cancel => report(renderer, orchestrator.cancel().await, "nothing to cancel"),
        ReplCommand::Status => orchestrator
            .snapshot()
            .await
            .map(|snapshot| render_status(renderer, &snapshot)),
        ReplCommand::History => orchestrator
            .history()
            .await
            .map(|entries| render_history(renderer, &entries)),
        ReplCommand::Help => {
            render_help(renderer);
            Ok(())
        }
        ReplCommand::Quit => Ok(()),
        ReplCommand::Invalid(msg) => {
            renderer.warn(&msg);
            Ok(())
        }
    };
    if let Err(e) = result {
        renderer.error(&e.to_string());
    }
}

/// Warn with `noop_msg` when the orchestrator declined the request.
fn report(
    renderer: &dyn RenderSink,
    result: Result<bool, runstream::error::RunError>,
    noop_msg: &str,
) -> Result<(), runstream::error::RunError> {
    if !result? {
        renderer.warn(noop_msg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_terminal_state() {
        assert_eq!(exit_code_for(SessionState::Completed), 0);
        assert_eq!(exit_code_for(SessionState::Errored), 1);
        assert_eq!(exit_code_for(SessionState::Cancelled), 130);
    }

    #[test]
    fn base_url_override_is_validated() {
        let mut config = Config::default();
        let args = cli::Args::parse_from(["runstream", "--base-url", "localhost:9000"]);
        assert!(apply_cli_overrides(&mut config, &args).is_err());

        let args = cli::Args::parse_from([
            "runstream",
            "--base-url",
            "http://automation.internal:9000",
            "--no-color",
        ]);
        apply_cli_overrides(&mut config, &args).expect("valid override");
        assert_eq!(config.server.base_url, "http://automation.internal:9000");
        assert!(!config.display.color);
    }
}
