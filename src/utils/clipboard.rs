use std::error::Error as StdError;
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

/// Destination for copied text. The OS clipboard is one implementation;
/// tests record into memory instead.
pub trait ClipboardSink {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    /// None of the platform clipboard commands could be started.
    Unavailable(String),
    /// A clipboard command ran but reported failure.
    CommandFailed(String),
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardError::Unavailable(detail) => write!(f, "clipboard unavailable: {detail}"),
            ClipboardError::CommandFailed(cmd) => write!(f, "clipboard command `{cmd}` failed"),
        }
    }
}

impl StdError for ClipboardError {}

/// Copies through the platform's clipboard command line tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        copy_to_clipboard(text)
    }
}

pub fn copy_to_clipboard(text: &str) -> Result<(), ClipboardError> {
    #[cfg(target_os = "macos")]
    {
        return run_with_stdin("pbcopy", &[], text);
    }
    #[cfg(target_os = "windows")]
    {
        return run_with_stdin("cmd", &["/C", "clip"], text);
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let candidates: [(&str, &[&str]); 3] = [
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ];
        let mut last_failure = None;
        for (cmd, args) in candidates {
            match run_with_stdin(cmd, args, text) {
                Ok(()) => return Ok(()),
                Err(err @ ClipboardError::CommandFailed(_)) => last_failure = Some(err),
                Err(ClipboardError::Unavailable(_)) => {}
            }
        }
        Err(last_failure.unwrap_or_else(|| {
            ClipboardError::Unavailable(
                "no clipboard command found (install wl-copy, xclip, or xsel)".to_string(),
            )
        }))
    }
}

fn run_with_stdin(cmd: &str, args: &[&str], input: &str) -> Result<(), ClipboardError> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|_| ClipboardError::Unavailable(format!("`{cmd}` not available")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|_| ClipboardError::CommandFailed(cmd.to_string()))?;
    }
    match child.wait() {
        Ok(status) if status.success() => Ok(()),
        _ => Err(ClipboardError::CommandFailed(cmd.to_string())),
    }
}
