//! Command-line front end for the appreciation board.
//!
//! # Responsibility
//! - Wire a store, config and logging into a `Board` and run one command.
//! - Render notes and notifications as plain text or JSON.

use appreciation_core::{
    init_from_config, init_logging, Board, BoardConfig, CardModel, NoteId, NoteStore,
    OperationOutcome, Role, RoleFilter, SqliteNoteStore,
};
use chrono::prelude::*;
use clap::{Parser, Subcommand};
use log::info;
use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "appreciation", author, version, about = "Appreciation board CLI")]
struct Cli {
    /// SQLite database file. Uses a throwaway in-memory database when omitted.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Absolute directory for log files; overrides the config value.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Post a new appreciation.
    Post {
        #[arg(long, value_parser = parse_role, default_value = "Student")]
        role: Role,
        message: String,
    },
    /// List appreciations, newest first.
    List {
        #[arg(long, value_parser = parse_filter, default_value = "All")]
        role: RoleFilter,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Respond to an appreciation that has no response yet.
    Respond { id: String, text: String },
    /// Delete one appreciation.
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Print the accepted roles.
    Roles,
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse().map_err(|err| format!("{err}"))
}

fn parse_filter(value: &str) -> Result<RoleFilter, String> {
    value.parse().map_err(|err| format!("{err}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool, Box<dyn Error>> {
    let config = match cli.config.as_ref() {
        Some(path) => BoardConfig::load(path)?,
        None => BoardConfig::default(),
    };
    match cli.log_dir.as_ref() {
        Some(dir) => init_logging(&config.log_level, dir)?,
        None => {
            init_from_config(&config)?;
        }
    }

    let store: Arc<dyn NoteStore> = match cli.db.as_ref() {
        Some(path) => Arc::new(SqliteNoteStore::open(path)?),
        None => Arc::new(SqliteNoteStore::open_in_memory()?),
    };
    let board = Board::connect(store, &config);
    info!(
        "event=cli_command module=cli status=start command={}",
        command_name(&cli.command)
    );

    let succeeded = match cli.command {
        Command::Post { role, message } => {
            let outcome = board.controller().submit_note(role, &message).await;
            if let OperationOutcome::Succeeded(id) = &outcome {
                println!("{id}");
            }
            report(&board, &outcome)
        }
        Command::List { role, json } => {
            print_cards(&board.cards(role), role, json)?;
            true
        }
        Command::Respond { id, text } => {
            let outcome = board
                .controller()
                .add_response(&NoteId::new(id), &text)
                .await;
            report(&board, &outcome)
        }
        Command::Delete { id, yes } => {
            let id = NoteId::new(id);
            let outcome = board
                .controller()
                .delete_note(&id, |target: &NoteId| yes || prompt_delete(target))
                .await;
            if matches!(outcome, OperationOutcome::Declined) {
                println!("Delete cancelled");
            }
            report(&board, &outcome)
        }
        Command::Roles => {
            for role in Role::ALL {
                println!("{role}");
            }
            true
        }
    };
    Ok(succeeded)
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Post { .. } => "post",
        Command::List { .. } => "list",
        Command::Respond { .. } => "respond",
        Command::Delete { .. } => "delete",
        Command::Roles => "roles",
    }
}

/// Prints the visible notification and maps the outcome to success.
fn report<T>(board: &Board, outcome: &OperationOutcome<T>) -> bool {
    if let Some(notification) = board.controller().last_notification() {
        println!("{}", notification.message);
    }
    matches!(
        outcome,
        OperationOutcome::Succeeded(_) | OperationOutcome::Declined
    )
}

fn print_cards(cards: &[CardModel], filter: RoleFilter, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        let notes: Vec<_> = cards.iter().map(|card| &card.note).collect();
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }
    if cards.is_empty() {
        println!("{}", filter.empty_state_message());
        return Ok(());
    }
    for card in cards {
        println!(
            "[{}] {} ({}, {})",
            card.note.id,
            card.note.role,
            card.color.as_str(),
            format_date(card.note.created_at, &Local)
        );
        println!("  {}", card.note.message);
        match card.note.response.as_deref() {
            Some(response) => println!("  -> \"{response}\""),
            None => println!("  (no response yet)"),
        }
    }
    Ok(())
}

/// Renders store milliseconds as `Mon D, YYYY` in `tz`.
fn format_date<Tz: TimeZone>(created_at_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match DateTime::from_timestamp_millis(created_at_ms) {
        Some(utc) => utc.with_timezone(tz).format("%b %-d, %Y").to_string(),
        None => created_at_ms.to_string(),
    }
}

fn prompt_delete(id: &NoteId) -> bool {
    print!("Delete appreciation {id}? [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
