mod registry;

pub use registry::{all_commands, find_command, Command};

use crate::core::session::{Session, SessionId, SessionStore};
use crate::utils::logging::USER_PREFIX;
use chrono::Utc;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// What a line typed into the chat prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Message(String),
    Help,
    NewSession,
    ListSessions,
    Switch(String),
    Copy(Option<usize>),
    Log(Option<String>),
    Dump(Option<String>),
    Quit,
    /// A known command used with the wrong arguments.
    Usage(&'static str),
}

/// Classify a line of input. Anything that is not a known slash command,
/// including unknown `/words`, is a message for the assistant.
pub fn process_input(input: &str) -> ChatInput {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ChatInput::Message(input.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let args = parts.next().unwrap_or_default().trim();

    let Some(command) = find_command(name) else {
        return ChatInput::Message(input.to_string());
    };
    let single_arg = || {
        let mut words = args.split_whitespace();
        match (words.next(), words.next()) {
            (None, _) => Ok(None),
            (Some(word), None) => Ok(Some(word.to_string())),
            (Some(_), Some(_)) => Err(()),
        }
    };

    match command.name {
        "help" => ChatInput::Help,
        "new" => ChatInput::NewSession,
        "sessions" => ChatInput::ListSessions,
        "quit" => ChatInput::Quit,
        "switch" => match single_arg() {
            Ok(Some(target)) => ChatInput::Switch(target),
            _ => ChatInput::Usage(command.usage),
        },
        "copy" => match single_arg() {
            Ok(None) => ChatInput::Copy(None),
            Ok(Some(n)) => match n.parse::<usize>() {
                Ok(n) if n > 0 => ChatInput::Copy(Some(n)),
                _ => ChatInput::Usage(command.usage),
            },
            Err(()) => ChatInput::Usage(command.usage),
        },
        "log" => match single_arg() {
            Ok(file) => ChatInput::Log(file),
            Err(()) => ChatInput::Usage(command.usage),
        },
        "dump" => match single_arg() {
            Ok(file) => ChatInput::Dump(file),
            Err(()) => ChatInput::Usage(command.usage),
        },
        _ => ChatInput::Message(input.to_string()),
    }
}

pub fn help_text() -> String {
    let mut help = String::from("Commands:\n");
    for command in all_commands() {
        help.push_str(&format!("  {:<22} {}\n", command.usage, command.help));
    }
    help.push_str("Anything else is sent to the assistant.");
    help
}

/// Look a session up by its 1-based position in the listing or by id.
pub fn resolve_session_ref(store: &SessionStore, reference: &str) -> Option<SessionId> {
    if let Ok(position) = reference.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| store.sessions().get(index))
            .map(|session| session.id().clone());
    }
    let id = SessionId::from(reference);
    store.contains(&id).then_some(id)
}

pub fn default_dump_filename() -> String {
    let timestamp = Utc::now().format("%Y-%m-%d");
    format!("nestchat-{timestamp}.txt")
}

/// Write a session to `filename` in transcript format. Refuses to replace an
/// existing file unless `overwrite` is set.
pub fn dump_session(
    session: &Session,
    filename: &str,
    overwrite: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !overwrite && Path::new(filename).exists() {
        return Err(format!(
            "File '{filename}' already exists. Please specify a different filename with /dump <filename>."
        )
        .into());
    }

    let file = File::create(filename)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "## {}", session.title())?;
    writeln!(writer)?;
    for msg in session.messages() {
        if msg.is_user() {
            writeln!(writer, "{USER_PREFIX}: {}", msg.text())?;
        } else {
            writeln!(writer, "{}", msg.text())?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}
