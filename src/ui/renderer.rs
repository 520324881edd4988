//! Plain-text rendering of messages for a line-mode terminal.

use chrono::Local;
use std::fmt::Write;
use unicode_width::UnicodeWidthStr;

use crate::core::clipboard::{ClipboardController, CopyTarget};
use crate::core::formatter::{format_response, Segment};
use crate::core::message::Message;
use crate::core::session::{Session, SessionSummary};
use crate::utils::logging::USER_PREFIX;

const ASSISTANT_LABEL: &str = "Nest";
const MAX_RULE_WIDTH: usize = 72;
const COPIED_MARKER: &str = " ✓ copied";

pub fn render_message(message: &Message, clipboard: &ClipboardController) -> String {
    let time = message.created_at().with_timezone(&Local).format("%H:%M");
    let mut out = String::new();

    if message.is_user() {
        let _ = writeln!(out, "{USER_PREFIX} · {time}");
        out.push_str(message.text());
        out.push('\n');
        return out;
    }

    let copied = clipboard
        .is_copied(&CopyTarget::message(message.id()))
        .then_some(COPIED_MARKER)
        .unwrap_or_default();
    let _ = writeln!(out, "{ASSISTANT_LABEL} · {time}{copied}");

    let mut block_number = 0;
    for (index, segment) in format_response(message.text()).iter().enumerate() {
        match segment {
            Segment::Text { content } => {
                out.push_str(content);
                if !content.ends_with('\n') {
                    out.push('\n');
                }
            }
            Segment::Code { content, language } => {
                block_number += 1;
                let copied = clipboard
                    .is_copied(&CopyTarget::segment(message.id(), index))
                    .then_some(COPIED_MARKER)
                    .unwrap_or_default();
                render_code_block(&mut out, content, language.as_deref(), block_number, copied);
            }
        }
    }
    out
}

fn render_code_block(
    out: &mut String,
    content: &str,
    language: Option<&str>,
    number: usize,
    copied: &str,
) {
    let widest = content.lines().map(UnicodeWidthStr::width).max().unwrap_or(0);
    let label = match language {
        Some(lang) => format!("─ [{number}] {lang} "),
        None => format!("─ [{number}] "),
    };
    let rule_width = (widest + 2).clamp(label.width() + 1, MAX_RULE_WIDTH);

    let _ = writeln!(
        out,
        "┌{label}{}{copied}",
        "─".repeat(rule_width.saturating_sub(label.width()))
    );
    for line in content.lines() {
        let _ = writeln!(out, "│ {line}");
    }
    let _ = writeln!(out, "└{}", "─".repeat(rule_width));
}

pub fn render_session(session: &Session, clipboard: &ClipboardController) -> String {
    let mut out = format!("── {} ──\n", session.title());
    for message in session.messages() {
        out.push_str(&render_message(message, clipboard));
        out.push('\n');
    }
    out
}

pub fn render_session_list(sessions: &[SessionSummary]) -> String {
    let mut out = String::new();
    for (position, summary) in sessions.iter().enumerate() {
        let marker = if summary.active { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} {:>2}. {} ({} messages, {})",
            position + 1,
            summary.title,
            summary.message_count,
            summary.id
        );
    }
    out
}
