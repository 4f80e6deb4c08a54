//! Terminal front end: the chat window and the confirmation dialog.
//!
//! Reads lines from stdin. Plain lines are sent as chat messages; lines
//! starting with `/` are console commands. While a turn runs, the console
//! watches the session status and asks `y/N` whenever a write needs
//! confirmation.

use std::io::Write;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::agent_core::text::truncate_chars;
use crate::agent_core::{ConversationSession, ConversationStatus, Message, MessageRole, TableResult};

/// Widest a rendered table cell may be.
const MAX_CELL_CHARS: usize = 40;

/// Rows shown before the table is cut off.
const MAX_TABLE_ROWS: usize = 50;

const HELP: &str = "\
Commands:
  /collections        list collections and refresh the catalogue
  /use <collection>   focus the assistant on a collection (/use alone clears)
  /clear              clear the conversation
  /key <api-key>      set the model API key
  /help               show this help
  /quit               exit";

// ─── Commands ───────────────────────────────────────────────────────────────

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Chat(String),
    Use(Option<String>),
    Collections,
    Clear,
    Key(String),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> ConsoleCommand {
    let line = line.trim();
    if line.is_empty() {
        return ConsoleCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ConsoleCommand::Chat(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "use" => ConsoleCommand::Use(Some(arg.to_string()).filter(|a| !a.is_empty())),
        "collections" => ConsoleCommand::Collections,
        "clear" => ConsoleCommand::Clear,
        "key" => ConsoleCommand::Key(arg.to_string()),
        "help" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => ConsoleCommand::Unknown(other.to_string()),
    }
}

/// `y` / `yes` (any case) allows; everything else denies.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

// ─── Rendering ──────────────────────────────────────────────────────────────

fn cell_text(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() > MAX_CELL_CHARS {
        format!("{}…", truncate_chars(&single_line, MAX_CELL_CHARS - 1))
    } else {
        single_line
    }
}

/// Render a table as aligned plain text.
pub fn render_table(table: &TableResult) -> String {
    let shown = &table.rows[..table.rows.len().min(MAX_TABLE_ROWS)];
    let cells: Vec<Vec<String>> = shown
        .iter()
        .map(|row| table.columns.iter().map(|c| cell_text(row.get(c))).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&format_row(&table.columns));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &cells {
        out.push_str(&format_row(row));
        out.push('\n');
    }

    let total = table.total_found.unwrap_or(table.rows.len() as u64);
    out.push_str(&format!(
        "({} of {} from {})",
        shown.len(),
        total,
        table.collection_name
    ));
    out
}

/// Render a finished message for the terminal.
pub fn render_message(message: &Message) -> String {
    let mut out = match message.role {
        MessageRole::User => format!("you> {}", message.content),
        MessageRole::Assistant => format!("assistant> {}", message.content),
        MessageRole::Error => format!("error> {}", message.content),
    };
    if let Some(table) = &message.table_data {
        out.push('\n');
        out.push_str(&render_table(table));
    }
    out
}

/// Messages the latest turn produced: everything after the last user message.
pub fn turn_replies(messages: &[Message]) -> &[Message] {
    let start = messages
        .iter()
        .rposition(|m| m.role == MessageRole::User)
        .map_or(0, |i| i + 1);
    &messages[start..]
}

// ─── Loop ───────────────────────────────────────────────────────────────────

type InputLines = Lines<BufReader<Stdin>>;

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

async fn read_line(lines: &mut InputLines) -> anyhow::Result<Option<String>> {
    Ok(lines.next_line().await?)
}

/// Run the interactive console until `/quit` or end of input.
pub async fn run(session: Arc<ConversationSession>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("searchdesk: chat with your search collections. Type /help for commands.");

    if !session.is_model_ready() {
        prompt("Model API key: ");
        if let Some(key) = read_line(&mut lines).await? {
            session.initialize_model(&key);
        }
        if !session.is_model_ready() {
            println!("No API key set. Use /key <api-key> before chatting.");
        }
    }

    match session.refresh_catalogue().await {
        Ok(count) => println!("{count} collection(s) available."),
        Err(e) => {
            tracing::warn!(error = %e, "initial catalogue load failed");
            println!("Could not load collections: {e}");
        }
    }

    loop {
        prompt("> ");
        let Some(line) = read_line(&mut lines).await? else {
            break;
        };

        match parse_command(&line) {
            ConsoleCommand::Empty => {}
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Unknown(name) => println!("Unknown command /{name}. Try /help."),
            ConsoleCommand::Clear => {
                session.clear_messages();
                println!("Conversation cleared.");
            }
            ConsoleCommand::Key(key) => {
                session.initialize_model(&key);
                if session.is_model_ready() {
                    println!("API key set.");
                } else {
                    println!("API key cleared.");
                }
            }
            ConsoleCommand::Use(name) => {
                match &name {
                    Some(n) if !session.collections().iter().any(|c| &c.name == n) => {
                        println!("Note: '{n}' is not in the loaded catalogue.");
                    }
                    _ => {}
                }
                match &name {
                    Some(n) => println!("Now focused on '{n}'."),
                    None => println!("Collection focus cleared."),
                }
                session.set_selected_collection(name);
            }
            ConsoleCommand::Collections => match session.refresh_catalogue().await {
                Ok(_) => {
                    for c in session.collections() {
                        println!("  {} ({} documents, {} fields)", c.name, c.num_documents, c.fields.len());
                    }
                }
                Err(e) => println!("Could not load collections: {e}"),
            },
            ConsoleCommand::Chat(text) => run_turn(&session, text, &mut lines).await?,
        }
    }

    session.clear_messages();
    tracing::info!("console closed");
    Ok(())
}

/// Send one message and act as the confirmation dialog until it finishes.
async fn run_turn(
    session: &Arc<ConversationSession>,
    text: String,
    lines: &mut InputLines,
) -> anyhow::Result<()> {
    let mut status = session.subscribe_status();

    let turn = {
        let session = session.clone();
        tokio::spawn(async move { session.send_message(&text).await })
    };
    tokio::pin!(turn);

    let outcome = loop {
        tokio::select! {
            joined = &mut turn => break joined?,
            changed = status.changed() => {
                if changed.is_err() {
                    break (&mut turn).await?;
                }
                let current = *status.borrow_and_update();
                if current != ConversationStatus::AwaitingConfirmation {
                    continue;
                }
                let Some(action) = session.pending_action() else {
                    continue;
                };
                println!("Confirm: {}", action.human_description);
                prompt("Allow? [y/N] ");
                let answer = read_line(lines).await?.unwrap_or_default();
                session.resolve_confirmation(is_affirmative(&answer));
            }
        }
    };

    if let Err(rejected) = outcome {
        println!("Not sent: {rejected}");
        return Ok(());
    }

    for message in turn_replies(&session.messages()) {
        println!("{}", render_message(message));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
