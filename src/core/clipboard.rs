//! Tracks which message or code block was copied most recently so the UI can
//! show a transient "copied" marker next to it.

use std::time::{Duration, Instant};

use crate::core::message::MessageId;
use crate::utils::clipboard::{ClipboardError, ClipboardSink};

/// How long a target reads as copied after a copy action.
pub const COPIED_INDICATOR_DURATION: Duration = Duration::from_millis(2000);

/// Identifies what was copied: a whole message, or one segment of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CopyTarget(String);

impl CopyTarget {
    pub fn message(id: &MessageId) -> Self {
        Self(id.as_str().to_string())
    }

    pub fn segment(id: &MessageId, index: usize) -> Self {
        Self(format!("{}#{index}", id.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CopyTarget {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CopyState {
    pub active_target: Option<CopyTarget>,
    pub expires_at: Option<Instant>,
}

/// Expiry is checked lazily on read; nothing needs to tick.
#[derive(Debug, Default)]
pub struct ClipboardController {
    state: CopyState,
}

impl ClipboardController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_copied(&mut self, target: CopyTarget) {
        self.mark_copied_at(target, Instant::now());
    }

    pub fn mark_copied_at(&mut self, target: CopyTarget, now: Instant) {
        self.state = CopyState {
            active_target: Some(target),
            expires_at: Some(now + COPIED_INDICATOR_DURATION),
        };
    }

    pub fn is_copied(&self, target: &CopyTarget) -> bool {
        self.is_copied_at(target, Instant::now())
    }

    pub fn is_copied_at(&self, target: &CopyTarget, now: Instant) -> bool {
        match (&self.state.active_target, self.state.expires_at) {
            (Some(active), Some(expires_at)) => active == target && now < expires_at,
            _ => false,
        }
    }

    /// Handle a copy request: hand `text` to the sink and mark `target` as
    /// copied once the sink accepts it.
    pub fn copy(
        &mut self,
        target: CopyTarget,
        text: &str,
        sink: &dyn ClipboardSink,
    ) -> Result<(), ClipboardError> {
        sink.write_text(text)?;
        tracing::debug!(copy_target = target.as_str(), chars = text.len(), "copied to clipboard");
        self.mark_copied(target);
        Ok(())
    }

    pub fn state(&self) -> &CopyState {
        &self.state
    }
}
