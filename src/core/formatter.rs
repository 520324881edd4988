//! Splits raw reply text into plain-text and fenced-code segments.

use memchr::memmem;
use serde::{Deserialize, Serialize};

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Text {
        content: String,
    },
    Code {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl Segment {
    pub fn text(content: impl Into<String>) -> Self {
        Segment::Text {
            content: content.into(),
        }
    }

    pub fn code(content: impl Into<String>) -> Self {
        Segment::Code {
            content: content.into(),
            language: None,
        }
    }

    pub fn code_with_language(content: impl Into<String>, language: impl Into<String>) -> Self {
        Segment::Code {
            content: content.into(),
            language: Some(language.into()),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Segment::Text { content } | Segment::Code { content, .. } => content,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Segment::Code { .. })
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Segment::Code { language, .. } => language.as_deref(),
            Segment::Text { .. } => None,
        }
    }
}

/// Format reply text into ordered segments.
///
/// Text without any fence comes back as one text segment holding the whole
/// input. Otherwise fences are paired left to right; each pair yields a code
/// segment with its body trimmed, and the text around pairs is kept as-is.
/// A trailing unpaired fence and everything after it become a final text
/// segment. Whitespace-only text and empty code bodies are dropped.
pub fn format_response(text: &str) -> Vec<Segment> {
    let fences: Vec<usize> = memmem::find_iter(text.as_bytes(), FENCE).collect();
    if fences.is_empty() {
        return vec![Segment::text(text)];
    }

    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut pairs = fences.chunks_exact(2);
    for pair in &mut pairs {
        let (open, close) = (pair[0], pair[1]);
        push_text(&mut segments, &text[cursor..open]);
        push_code(&mut segments, &text[open + FENCE.len()..close]);
        cursor = close + FENCE.len();
    }

    match pairs.remainder() {
        [unmatched] => {
            push_text(&mut segments, &text[cursor..*unmatched]);
            push_text(&mut segments, &text[*unmatched..]);
        }
        _ => push_text(&mut segments, &text[cursor..]),
    }

    segments
}

fn push_text(segments: &mut Vec<Segment>, chunk: &str) {
    if !chunk.trim().is_empty() {
        segments.push(Segment::text(chunk));
    }
}

fn push_code(segments: &mut Vec<Segment>, body: &str) {
    let (language, content) = split_language_hint(body);
    if content.is_empty() {
        return;
    }
    segments.push(Segment::Code {
        content: content.to_string(),
        language: language.map(str::to_string),
    });
}

/// A fence opened as "```rust\n" carries a language hint on its first line.
/// Any other first line is code and stays in the body.
fn split_language_hint(body: &str) -> (Option<&str>, &str) {
    let Some((first_line, rest)) = body.split_once('\n') else {
        return (None, body.trim());
    };
    let hint = first_line.trim_end();
    if !is_language_name(hint) {
        return (None, body.trim());
    }
    (Some(hint), rest.trim())
}

fn is_language_name(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '#' | '.' | '-'))
}
