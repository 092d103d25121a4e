//! CLI argument parsing via clap, plus the REPL command grammar.

use clap::{Parser, Subcommand};

/// Run automation requests against a repository and watch them stream.
#[derive(Debug, Parser)]
#[command(name = "runstream", version)]
pub struct Args {
    /// Path to config file (default: ./runstream.toml or ~/.config/runstream/runstream.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Override the automation server base URL.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one request to completion and exit with its outcome.
    Run {
        /// Target repository, e.g. `org/repo`.
        #[arg(short = 'r', long = "repo")]
        repo: String,

        /// Free-form automation request.
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        command: Vec<String>,
    },
}

/// One parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Run { repo: String, command: String },
    Approve,
    Reject,
    Edit(String),
    ResetEdit,
    Cancel,
    Status,
    History,
    Help,
    Quit,
    /// Unparseable input, with a usage hint.
    Invalid(String),
}

pub const REPL_HELP: &[(&str, &str)] = &[
    ("/run <repo> <request>", "start a session"),
    ("/approve", "approve the pending action"),
    ("/reject", "reject the pending action"),
    ("/edit <text>", "rewrite the pending action before approving"),
    ("/reset-edit", "restore the proposed action"),
    ("/cancel", "cancel the running session"),
    ("/status", "show the current session"),
    ("/history", "list finished sessions"),
    ("/quit", "exit"),
];

/// Parse one REPL line. Blank lines yield `None`.
pub fn parse_repl_line(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let command = match head {
        "/run" => match rest.split_once(char::is_whitespace) {
            Some((repo, command)) if !command.trim().is_empty() => ReplCommand::Run {
                repo: repo.to_string(),
                command: command.trim().to_string(),
            },
            _ => ReplCommand::Invalid("usage: /run <repo> <request>".to_string()),
        },
        "/approve" => ReplCommand::Approve,
        "/reject" => ReplCommand::Reject,
        "/edit" if rest.is_empty() => ReplCommand::Invalid("usage: /edit <text>".to_string()),
        "/edit" => ReplCommand::Edit(rest.to_string()),
        "/reset-edit" => ReplCommand::ResetEdit,
        "/cancel" => ReplCommand::Cancel,
        "/status" => ReplCommand::Status,
        "/history" => ReplCommand::History,
        "/help" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Invalid(format!("unknown command `{other}` (try /help)")),
    };
    Some(command)
}
