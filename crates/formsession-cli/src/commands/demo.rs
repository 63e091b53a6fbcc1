use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use formsession_core::{
    FieldMap, FieldValue, FormSession, FormSessionConfig, InMemoryRecordStore, RefreshOutcome,
    ReseedOutcome, RuleSet, SaveOutcome,
};

use super::render;

const COMMANDS: &[&str] = &[
    "help",
    "show",
    "edit",
    "set",
    "tag",
    "untag",
    "save",
    "cancel",
    "reset",
    "refresh",
    "fail-next",
    "remote",
    "error",
    "clear-error",
    "dismiss",
    "quit",
];

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Help,
    Show,
    Edit,
    Set { field: String, value: String },
    Tag(String),
    Untag(String),
    Save,
    Cancel,
    Reset,
    Refresh,
    FailNext(String),
    Remote { field: String, value: String },
    Error { field: String, text: String },
    ClearError(String),
    Dismiss,
    Quit,
}

fn parse_command(line: &str) -> std::result::Result<ReplCommand, String> {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let rest = parts.next().map(str::trim).unwrap_or("");

    let field_and_value = |usage: &str| -> std::result::Result<(String, String), String> {
        let mut split = rest.splitn(2, char::is_whitespace);
        match (split.next(), split.next()) {
            (Some(field), value) if !field.is_empty() => Ok((
                field.to_string(),
                value.map(str::trim).unwrap_or("").to_string(),
            )),
            _ => Err(format!("Usage: {usage}")),
        }
    };
    let required = |usage: &str| -> std::result::Result<String, String> {
        if rest.is_empty() {
            Err(format!("Usage: {usage}"))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match name {
        "help" | "?" => ReplCommand::Help,
        "show" | "" => ReplCommand::Show,
        "edit" => ReplCommand::Edit,
        "set" => {
            let (field, value) = field_and_value("set <field> <value>")?;
            ReplCommand::Set { field, value }
        }
        "tag" => ReplCommand::Tag(required("tag <name>")?),
        "untag" => ReplCommand::Untag(required("untag <name>")?),
        "save" => ReplCommand::Save,
        "cancel" => ReplCommand::Cancel,
        "reset" => ReplCommand::Reset,
        "refresh" => ReplCommand::Refresh,
        "fail-next" => ReplCommand::FailNext(required("fail-next <reason>")?),
        "remote" => {
            let (field, value) = field_and_value("remote <field> <value>")?;
            ReplCommand::Remote { field, value }
        }
        "error" => {
            let (field, text) = field_and_value("error <field> <text>")?;
            ReplCommand::Error { field, text }
        }
        "clear-error" => ReplCommand::ClearError(required("clear-error <field>")?),
        "dismiss" => ReplCommand::Dismiss,
        "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("Unknown command '{other}'. Type 'help'.")),
    };
    Ok(command)
}

/// rustyline helper providing command completion, highlighting, and hints.
#[derive(Clone)]
struct DemoHelper;

impl Helper for DemoHelper {}

impl Completer for DemoHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for DemoHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let name = line.split_whitespace().next().unwrap_or("");
        if line.starts_with(name) && COMMANDS.contains(&name) {
            Owned(format!("{}{}", name.bright_cyan(), &line[name.len()..]))
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for DemoHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.is_empty() || line.contains(' ') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Validator for DemoHelper {}

fn sample_profile() -> FieldMap {
    FieldMap::new()
        .with("fullName", "")
        .with("email", "")
        .with("role", "viewer")
        .with("tags", FieldValue::tags(Vec::<String>::new()))
}

fn profile_rules() -> RuleSet {
    RuleSet::new()
        .required("fullName", "Full name is required")
        .email("email", "Email is required", "Please enter a valid email address")
        .max_length("role", 32, "Role must be at most 32 characters")
}

/// Applies one tag edit to the `tags` field.
fn with_tag(record: &FieldMap, tag: &str, present: bool) -> FieldMap {
    let mut tags = record
        .get("tags")
        .and_then(FieldValue::as_tags)
        .cloned()
        .unwrap_or_default();
    if present {
        tags.insert(tag.to_string());
    } else {
        tags.remove(tag);
    }
    record.clone().with("tags", FieldValue::Tags(tags))
}

fn print_help() {
    let lines = [
        ("show", "Show the record"),
        ("edit", "Start editing"),
        ("set <field> <value>", "Change a field"),
        ("tag / untag <name>", "Add or remove a tag"),
        ("save", "Validate and save"),
        ("cancel", "Discard edits and stop editing"),
        ("reset", "Discard edits, keep editing"),
        ("refresh", "Reload from the store"),
        ("fail-next <reason>", "Make the next save fail"),
        ("remote <field> <value>", "Simulate another user changing the record"),
        ("error <field> <text>", "Attach a server-side field error"),
        ("clear-error <field>", "Remove a field error"),
        ("dismiss", "Dismiss the status message"),
        ("quit", "Exit"),
    ];
    for (usage, description) in lines {
        println!("  {:<24} {}", usage.bright_cyan(), description.bright_black());
    }
}

async fn build_config(path: Option<PathBuf>, auto_save_ms: Option<u64>) -> Result<FormSessionConfig> {
    let mut config = match path {
        Some(path) => FormSessionConfig::load(path).await?,
        None => FormSessionConfig::default(),
    };
    if let Some(ms) = auto_save_ms {
        config = config.with_auto_save(Duration::from_millis(ms));
        config.validate()?;
    }
    Ok(config)
}

/// Entry point for `formsession demo`.
pub async fn run(config_path: Option<PathBuf>, auto_save_ms: Option<u64>) -> Result<()> {
    let config = build_config(config_path, auto_save_ms).await?;
    let store = Arc::new(InMemoryRecordStore::new(sample_profile()));
    let session = FormSession::builder(store.record(), store.clone())
        .source(store.clone())
        .validator(profile_rules())
        .config(config)
        .build();

    // Trace every state change; auto-saves happen off the REPL loop
    let mut changes = session.subscribe();
    let watcher = tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let snapshot = changes.borrow_and_update().clone();
            tracing::debug!(
                mode = ?snapshot.mode,
                status = ?snapshot.status,
                dirty = snapshot.is_dirty,
                errors = snapshot.errors.len(),
                "session changed"
            );
        }
    });

    let mut rl = Editor::new()?;
    rl.set_helper(Some(DemoHelper));

    println!("{}", "=== Profile editor ===".bright_magenta().bold());
    if let Some(delay) = session.config().auto_save_delay() {
        println!("{}", format!("Auto-save after {:?} of inactivity.", delay).bright_black());
    }
    println!("{}", "Type 'help' for commands, 'quit' to exit.".bright_black());
    render::snapshot(&session.snapshot());

    loop {
        let prompt = if session.is_editing() { "edit> " } else { "view> " };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };
        if !line.trim().is_empty() {
            let _ = rl.add_history_entry(line.as_str());
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{}", usage.yellow());
                continue;
            }
        };

        match command {
            ReplCommand::Help => print_help(),
            ReplCommand::Show => render::snapshot(&session.snapshot()),
            ReplCommand::Edit => {
                if !session.start_editing() {
                    println!("{}", "Already editing.".bright_black());
                }
            }
            ReplCommand::Set { field, value } => {
                if session.update_field(FieldMap::new().with(field, value)) {
                    render::snapshot(&session.snapshot());
                } else {
                    println!("{}", "Type 'edit' first.".yellow());
                }
            }
            ReplCommand::Tag(tag) => {
                if !session.update_with(|record| with_tag(record, &tag, true)) {
                    println!("{}", "Type 'edit' first.".yellow());
                }
            }
            ReplCommand::Untag(tag) => {
                if !session.update_with(|record| with_tag(record, &tag, false)) {
                    println!("{}", "Type 'edit' first.".yellow());
                }
            }
            ReplCommand::Save => {
                if session.save().await == SaveOutcome::Skipped {
                    println!("{}", "A save is already running.".bright_black());
                }
                render::snapshot(&session.snapshot());
            }
            ReplCommand::Cancel => {
                if session.cancel() {
                    render::snapshot(&session.snapshot());
                } else {
                    println!("{}", "Nothing to cancel.".bright_black());
                }
            }
            ReplCommand::Reset => {
                session.reset();
                render::snapshot(&session.snapshot());
            }
            ReplCommand::Refresh => {
                if session.is_dirty() {
                    println!("{}", "Discarding unsaved changes.".yellow());
                }
                match session.refresh().await {
                    RefreshOutcome::Skipped => {
                        println!("{}", "Another operation is running.".bright_black())
                    }
                    _ => render::snapshot(&session.snapshot()),
                }
            }
            ReplCommand::FailNext(reason) => {
                store.fail_next_save(reason);
                println!("{}", "The next save will fail.".bright_black());
            }
            ReplCommand::Remote { field, value } => {
                store.replace(store.record().with(field, value));
                match session.reseed(store.record()) {
                    ReseedOutcome::Applied => render::snapshot(&session.snapshot()),
                    ReseedOutcome::Deferred => println!(
                        "{}",
                        "Record changed remotely; kept your unsaved edits.".yellow()
                    ),
                    ReseedOutcome::Unchanged => {}
                }
            }
            ReplCommand::Error { field, text } => {
                session.set_field_error(field, text);
                render::snapshot(&session.snapshot());
            }
            ReplCommand::ClearError(field) => {
                if !session.clear_field_error(&field) {
                    println!("{}", format!("No error on '{field}'.").bright_black());
                }
            }
            ReplCommand::Dismiss => session.dismiss_message(),
            ReplCommand::Quit => break,
        }
    }

    if session.is_dirty() {
        println!("{}", "Exiting with unsaved changes.".yellow());
    }
    session.dispose();
    drop(session);
    watcher.abort();
    println!("{}", "Goodbye!".bright_green());
    Ok(())
}
