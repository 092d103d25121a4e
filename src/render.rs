//! Terminal rendering.
//!
//! The streamed narrative goes to stdout untouched; everything else (status,
//! approvals, warnings) goes to stderr so output can be piped cleanly.
//! `RenderSink` lets the CLI adapter be tested without a terminal.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::style::{Color, Stylize};

const LABEL_WARNING: &str = "warning:";
const LABEL_ERROR: &str = "error:";
const LABEL_APPROVAL: &str = "approval:";
const PROMPT_SYMBOL: &str = ">";
const SECTION_BULLET: &str = "•";
const INDENT: &str = "  ";

/// Injectable rendering interface used by the CLI.
pub trait RenderSink: Send + Sync {
    /// Write one streamed output fragment to stdout.
    fn output(&self, fragment: &str);
    /// Render the interactive prompt.
    fn prompt(&self);
    fn section(&self, title: &str);
    fn activity(&self, text: &str);
    fn field(&self, key: &str, value: &str);
    /// Render an approval checkpoint that needs an operator decision.
    fn approval(&self, text: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Default terminal renderer.
#[derive(Debug, Default)]
pub struct Renderer {
    color: bool,
    /// Set while stdout does not end with a newline.
    stdout_mid_line: AtomicBool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            stdout_mid_line: AtomicBool::new(false),
        }
    }

    /// Close a partial stdout line before a stderr status line.
    fn break_output_line(&self) {
        if self.stdout_mid_line.swap(false, Ordering::SeqCst) {
            let mut stdout = io::stdout();
            let _ = writeln!(stdout);
            let _ = stdout.flush();
        }
    }

    fn labelled(&self, label: &str, color: Color, msg: &str) {
        self.break_output_line();
        if self.color {
            eprintln!("\r{} {msg}", label.with(color).bold());
        } else {
            eprintln!("\r{label} {msg}");
        }
    }
}

impl RenderSink for Renderer {
    fn output(&self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        let mut stdout = io::stdout();
        let _ = stdout.write_all(fragment.as_bytes());
        let _ = stdout.flush();
        self.stdout_mid_line
            .store(!fragment.ends_with('\n'), Ordering::SeqCst);
    }

    fn prompt(&self) {
        self.break_output_line();
        if self.color {
            eprint!("{} ", PROMPT_SYMBOL.with(Color::Cyan).bold());
        } else {
            eprint!("{PROMPT_SYMBOL} ");
        }
        let _ = io::stderr().flush();
    }

    fn section(&self, title: &str) {
        self.break_output_line();
        if self.color {
            eprintln!(
                "\r{} {}",
                SECTION_BULLET.with(Color::DarkGrey),
                title.with(Color::White).bold()
            );
        } else {
            eprintln!("\r{title}:");
        }
    }

    fn activity(&self, text: &str) {
        self.break_output_line();
        if self.color {
            eprintln!(
                "\r{} {}",
                SECTION_BULLET.with(Color::DarkGrey),
                text.with(Color::Grey).bold()
            );
        } else {
            eprintln!("\r{text}");
        }
    }

    fn field(&self, key: &str, value: &str) {
        self.break_output_line();
        if self.color {
            eprintln!(
                "\r{INDENT}{} {}",
                format!("{key}:").with(Color::DarkGrey),
                value.with(Color::White),
            );
        } else {
            eprintln!("\r{INDENT}{key}: {value}");
        }
    }

    fn approval(&self, text: &str) {
        self.labelled(LABEL_APPROVAL, Color::Magenta, text);
    }

    fn warn(&self, msg: &str) {
        self.labelled(LABEL_WARNING, Color::Yellow, msg);
    }

    fn error(&self, msg: &str) {
        self.labelled(LABEL_ERROR, Color::Red, msg);
    }
}
