//! Plain-text transcript logging enabled with `--log` or `/log`.

use crate::core::message::Message;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const USER_PREFIX: &str = "You";

pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    pub fn disabled() -> Self {
        Self {
            file_path: None,
            is_active: false,
        }
    }

    /// Start logging to `path` right away, failing if it cannot be written.
    pub fn to_file(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let mut log = Self::disabled();
        log.set_log_file(path)?;
        Ok(log)
    }

    pub fn set_log_file(&mut self, path: impl Into<PathBuf>) -> std::io::Result<String> {
        let path = path.into();
        test_file_access(&path)?;

        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    pub fn toggle_logging(&mut self) -> Result<String, String> {
        let Some(path) = &self.file_path else {
            return Err("No log file specified. Use /log <filename> to enable logging first.".into());
        };
        if self.is_active {
            if let Err(err) = self.write_lines("## Logging paused") {
                tracing::warn!(error = %err, "failed to write pause marker to transcript");
            }
            self.is_active = false;
            Ok(format!("Logging paused (file: {})", path.display()))
        } else {
            self.is_active = true;
            Ok(format!("Logging resumed to: {}", path.display()))
        }
    }

    pub fn log_message(&self, message: &Message) -> std::io::Result<()> {
        if !self.is_active {
            return Ok(());
        }
        if message.is_user() {
            self.write_lines(&format!("{USER_PREFIX}: {}", message.text()))
        } else {
            self.write_lines(message.text())
        }
    }

    pub fn log_session_switch(&self, title: &str) -> std::io::Result<()> {
        if !self.is_active {
            return Ok(());
        }
        self.write_lines(&format!("## Session: {title}"))
    }

    fn write_lines(&self, content: &str) -> std::io::Result<()> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between entries, matching the on-screen spacing.
        writeln!(writer)?;
        writer.flush()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn get_status_string(&self) -> String {
        match (&self.file_path, self.is_active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", file_name(path)),
            (Some(path), false) => format!("paused ({})", file_name(path)),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().into_owned()
}

fn test_file_access(path: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn disabled_log_writes_nothing() {
        let log = TranscriptLog::disabled();
        assert!(log.log_message(&Message::user("hi")).is_ok());
        assert_eq!(log.get_status_string(), "disabled");
        assert!(!log.is_active());
    }

    #[test]
    fn messages_are_appended_with_user_prefix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let log = TranscriptLog::to_file(&path).unwrap();

        log.log_message(&Message::user("Hello")).unwrap();
        log.log_message(&Message::assistant("Hi!\nHow can I help?"))
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "You: Hello\n\nHi!\nHow can I help?\n\n");
        assert_eq!(log.get_status_string(), "active (chat.log)");
    }

    #[test]
    fn toggling_pauses_and_resumes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        let mut log = TranscriptLog::to_file(&path).unwrap();

        assert!(log.toggle_logging().unwrap().starts_with("Logging paused"));
        log.log_message(&Message::user("hidden")).unwrap();
        assert_eq!(log.get_status_string(), "paused (chat.log)");

        assert!(log.toggle_logging().unwrap().starts_with("Logging resumed"));
        log.log_message(&Message::user("shown")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "## Logging paused\n\nYou: shown\n\n");
    }

    #[test]
    fn toggling_without_file_is_an_error() {
        let mut log = TranscriptLog::disabled();
        assert!(log.toggle_logging().is_err());
    }

    #[test]
    fn unwritable_path_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("chat.log");
        assert!(TranscriptLog::to_file(path).is_err());
    }
}
