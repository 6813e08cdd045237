//! Operator-facing terminal output.
//!
//! Human output goes to stdout and errors to stderr; logs are routed
//! separately through `tracing`. In JSON mode every line is an object tagged
//! with its `type` so wrappers can parse the stream.

use std::fmt::Display;
use std::sync::{OnceLock, RwLock};

use owo_colors::OwoColorize;
use serde_json::{json, Value};

/// Flags shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub json: bool,
    /// Hide informational lines; warnings and errors still print.
    pub quiet: bool,
    pub verbose: u8,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool, verbose: u8) -> Self {
        Self {
            json,
            quiet,
            verbose,
        }
    }
}

static CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn current() -> OutputConfig {
    let cell = CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()));
    match cell.read() {
        Ok(config) => *config,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

pub fn configure(config: OutputConfig) {
    let cell = CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()));
    match cell.write() {
        Ok(mut slot) => *slot = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

#[must_use]
pub fn is_json() -> bool {
    current().json
}

#[must_use]
pub fn verbosity() -> u8 {
    current().verbose
}

/// Whether a line is informational (hidden by `--quiet`) or must be shown.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Always,
}

/// Print `text` for humans or `payload` tagged `kind` for machines.
fn emit(kind: &str, payload: Value, level: Level, text: impl FnOnce() -> String) {
    let config = current();
    if config.json {
        println!("{}", json!({ "type": kind, "payload": payload }));
    } else if level == Level::Always || !config.quiet {
        println!("{}", text());
    }
}

pub fn header(version: &str) {
    emit(
        "header",
        json!({ "app": "stackwarden", "version": version }),
        Level::Info,
        || format!("{} {}\n", "stackwarden".bold(), version.dimmed()),
    );
}

pub fn section(title: &str) {
    emit("section", json!({ "title": title }), Level::Info, || {
        format!("\n{}", title.bold())
    });
}

/// A labelled value; an empty label continues the previous field.
pub fn field(label: &str, value: impl Display) {
    let value = value.to_string();
    emit(
        "field",
        json!({ "label": label, "value": value }),
        Level::Info,
        || format!("  {:<12} {value}", label.dimmed()),
    );
}

pub fn success(message: &str) {
    emit("success", json!({ "message": message }), Level::Info, || {
        format!("  {} {message}", "✓".green())
    });
}

pub fn warning(message: &str) {
    emit("warning", json!({ "message": message }), Level::Always, || {
        format!("  {} {message}", "⚠".yellow())
    });
}

/// Suggested follow-up command.
pub fn hint(message: &str) {
    emit("hint", json!({ "message": message }), Level::Info, || {
        format!("  {}: {}", "hint".cyan().dimmed(), message.dimmed())
    });
}

/// Pre-formatted block such as a table, indented line by line.
pub fn lines(content: &str) {
    emit("lines", json!({ "content": content }), Level::Info, || {
        content
            .lines()
            .map(|line| format!("  {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    });
}

/// Errors always go to stderr, in both modes.
pub fn error(message: &str) {
    if is_json() {
        eprintln!("{}", json!({ "type": "error", "payload": { "message": message } }));
    } else {
        eprintln!("  {} {message}", "×".red());
    }
}

pub fn json_output(value: Value) {
    println!("{value}");
}

fn paint(value: impl Display, style: fn(&str) -> String) -> String {
    let value = value.to_string();
    if is_json() {
        value
    } else {
        style(&value)
    }
}

pub fn positive(value: impl Display) -> String {
    paint(value, |text| text.green().to_string())
}

pub fn negative(value: impl Display) -> String {
    paint(value, |text| text.red().to_string())
}

pub fn highlight(value: impl Display) -> String {
    paint(value, |text| text.cyan().to_string())
}

pub fn muted(value: impl Display) -> String {
    paint(value, |text| text.dimmed().to_string())
}
