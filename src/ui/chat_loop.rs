//! Line-mode chat loop.
//!
//! Reads prompts and slash commands from stdin, runs sends in background
//! tasks and prints replies as they settle. The store stays behind the
//! dispatcher's mutex; this loop only locks it briefly to read or switch.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use crate::api::HttpGenerator;
use crate::commands::{
    default_dump_filename, dump_session, help_text, process_input, resolve_session_ref, ChatInput,
};
use crate::core::clipboard::{ClipboardController, CopyTarget};
use crate::core::config::ResolvedConfig;
use crate::core::dispatcher::{MessageDispatcher, NewSession, SettledSend, SEED_GREETING};
use crate::core::formatter::format_response;
use crate::core::message::Message;
use crate::core::session::{SessionStore, StoreEvent};
use crate::ui::renderer::{render_message, render_session, render_session_list};
use crate::utils::clipboard::{ClipboardSink, SystemClipboard};
use crate::utils::logging::TranscriptLog;

/// Completion of work started in a background task.
#[derive(Debug)]
pub enum ChatEvent {
    Settled(SettledSend),
    SessionCreated(NewSession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

pub struct ChatLoop {
    dispatcher: MessageDispatcher,
    clipboard: ClipboardController,
    sink: Box<dyn ClipboardSink + Send>,
    events_tx: mpsc::UnboundedSender<ChatEvent>,
}

impl ChatLoop {
    pub fn new(
        dispatcher: MessageDispatcher,
        sink: Box<dyn ClipboardSink + Send>,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                dispatcher,
                clipboard: ClipboardController::new(),
                sink,
                events_tx,
            },
            events_rx,
        )
    }

    pub async fn handle_line(&mut self, line: &str, out: &mut dyn Write) -> io::Result<LoopControl> {
        match process_input(line) {
            ChatInput::Message(text) => {
                let mut buffer = text;
                // Blank lines are ignored.
                if let Ok(in_flight) = self.dispatcher.submit(&mut buffer).await {
                    let tx = self.events_tx.clone();
                    tokio::spawn(async move {
                        let settled = in_flight.settle().await;
                        let _ = tx.send(ChatEvent::Settled(settled));
                    });
                }
            }
            ChatInput::NewSession => {
                writeln!(out, "Starting a new conversation...")?;
                let dispatcher = self.dispatcher.clone();
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let created = dispatcher.new_session().await;
                    let _ = tx.send(ChatEvent::SessionCreated(created));
                });
            }
            ChatInput::ListSessions => {
                let snapshot = self.dispatcher.store().lock().await.snapshot();
                write!(out, "{}", render_session_list(&snapshot))?;
            }
            ChatInput::Switch(reference) => self.switch_session(&reference, out).await?,
            ChatInput::Copy(block) => self.copy_last_reply(block, out).await?,
            ChatInput::Log(file) => self.update_log(file, out).await?,
            ChatInput::Dump(file) => {
                let overwrite = file.is_some();
                let filename = file.unwrap_or_else(default_dump_filename);
                let store = self.dispatcher.store().lock().await;
                match dump_session(store.get_active(), &filename, overwrite) {
                    Ok(()) => writeln!(out, "Conversation dumped to: {filename}")?,
                    Err(err) => writeln!(out, "Error dumping conversation: {err}")?,
                }
            }
            ChatInput::Help => writeln!(out, "{}", help_text())?,
            ChatInput::Usage(usage) => writeln!(out, "Usage: {usage}")?,
            ChatInput::Quit => return Ok(LoopControl::Quit),
        }
        Ok(LoopControl::Continue)
    }

    pub async fn handle_event(&mut self, event: ChatEvent, out: &mut dyn Write) -> io::Result<()> {
        match event {
            ChatEvent::Settled(settled) => {
                if let Some(err) = settled.reply.error() {
                    eprintln!(
                        "⚠️  Connection Error: Failed to connect to AI service. Please try again. ({err})"
                    );
                }
                let store = self.dispatcher.store().lock().await;
                if store.active_id() == &settled.session_id {
                    write!(
                        out,
                        "{}",
                        render_message(&settled.assistant_message, &self.clipboard)
                    )?;
                } else if let Some(session) = store.get(&settled.session_id) {
                    writeln!(out, "(new reply in \"{}\")", session.title())?;
                }
            }
            ChatEvent::SessionCreated(created) => {
                if let Some(err) = created.greeting.error() {
                    eprintln!(
                        "⚠️  Failed to initialize new chat. Using default welcome message. ({err})"
                    );
                }
                tracing::debug!(session = %created.session_id, title = %created.title, "session created");
            }
        }
        Ok(())
    }

    pub async fn handle_store_event(
        &mut self,
        event: StoreEvent,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        match event {
            StoreEvent::ActiveSessionChanged(id) => {
                let store = self.dispatcher.store().lock().await;
                if let Some(session) = store.get(&id) {
                    write!(out, "{}", render_session(session, &self.clipboard))?;
                }
            }
            StoreEvent::SessionsChanged(sessions) => {
                tracing::debug!(count = sessions.len(), "session list changed");
            }
        }
        Ok(())
    }

    async fn switch_session(&mut self, reference: &str, out: &mut dyn Write) -> io::Result<()> {
        let title = {
            let mut store = self.dispatcher.store().lock().await;
            let Some(id) = resolve_session_ref(&store, reference) else {
                writeln!(out, "No conversation matches '{reference}'. Try /sessions.")?;
                return Ok(());
            };
            if store.active_id() == &id {
                writeln!(out, "Already in \"{}\".", store.get_active().title())?;
                return Ok(());
            }
            store.set_active(&id);
            store.get_active().title().to_string()
        };

        if let Some(transcript) = self.dispatcher.transcript() {
            if let Err(err) = transcript.lock().await.log_session_switch(&title) {
                tracing::warn!(error = %err, "failed to write transcript");
            }
        }
        Ok(())
    }

    async fn copy_last_reply(&mut self, block: Option<usize>, out: &mut dyn Write) -> io::Result<()> {
        let selection = {
            let store = self.dispatcher.store().lock().await;
            match store.get_active().last_assistant_message() {
                Some(message) => select_copy_text(message, block),
                None => {
                    writeln!(out, "Nothing to copy yet.")?;
                    return Ok(());
                }
            }
        };
        let Some((target, text)) = selection else {
            writeln!(out, "That reply has no code block {}.", block.unwrap_or_default())?;
            return Ok(());
        };

        match self.clipboard.copy(target, &text, self.sink.as_ref()) {
            Ok(()) => writeln!(out, "Copied to clipboard.")?,
            Err(err) => writeln!(out, "Copy failed: {err}")?,
        }
        Ok(())
    }

    async fn update_log(&mut self, file: Option<String>, out: &mut dyn Write) -> io::Result<()> {
        let Some(transcript) = self.dispatcher.transcript() else {
            writeln!(out, "Logging is not available in this session.")?;
            return Ok(());
        };
        let mut log = transcript.lock().await;
        let result = match file {
            Some(path) => log.set_log_file(path).map_err(|err| format!("Error setting log file: {err}")),
            None => log.toggle_logging(),
        };
        match result {
            Ok(message) | Err(message) => writeln!(out, "{message}")?,
        }
        writeln!(out, "Transcript: {}", log.get_status_string())?;
        Ok(())
    }
}

/// Pick what `/copy` should place on the clipboard: the whole reply, or its
/// `n`-th code block counting from 1.
pub fn select_copy_text(message: &Message, block: Option<usize>) -> Option<(CopyTarget, String)> {
    let Some(n) = block else {
        return Some((CopyTarget::message(message.id()), message.text().to_string()));
    };
    format_response(message.text())
        .into_iter()
        .enumerate()
        .filter(|(_, segment)| segment.is_code())
        .nth(n.checked_sub(1)?)
        .map(|(index, segment)| {
            (
                CopyTarget::segment(message.id(), index),
                segment.content().to_string(),
            )
        })
}

pub async fn run_chat(
    resolved: ResolvedConfig,
    log_file: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let generator = HttpGenerator::new(
        &resolved.base_url,
        resolved.model.clone(),
        resolved.request_timeout,
    )?;
    let transcript = match &log_file {
        Some(path) => TranscriptLog::to_file(path)
            .map_err(|err| format!("Cannot write log file '{path}': {err}"))?,
        None => TranscriptLog::disabled(),
    };

    let (store, mut store_events) = SessionStore::with_events(SEED_GREETING);
    let dispatcher = MessageDispatcher::new(Arc::new(Mutex::new(store)), Arc::new(generator))
        .with_transcript(Arc::new(Mutex::new(transcript)));
    let (mut chat, mut chat_events) = ChatLoop::new(dispatcher.clone(), Box::new(SystemClipboard));

    eprintln!("🚀 Starting nestchat");
    eprintln!("📡 Endpoint: {}", resolved.base_url);
    if let Some(model) = &resolved.model {
        eprintln!("🤖 Model: {model}");
    }
    if let Some(path) = &log_file {
        eprintln!("📝 Logging to: {path}");
    }
    eprintln!("💡 Type /help for commands, /quit to leave");

    let mut out = io::stdout();
    {
        let store = dispatcher.store().lock().await;
        write!(out, "{}", render_session(store.get_active(), &ClipboardController::new()))?;
    }
    out.flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if chat.handle_line(&line, &mut out).await? == LoopControl::Quit {
                    break;
                }
            }
            Some(event) = chat_events.recv() => {
                chat.handle_event(event, &mut out).await?;
            }
            Some(event) = store_events.recv() => {
                chat.handle_store_event(event, &mut out).await?;
            }
        }
        out.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{GenerationError, Generator};
    use crate::core::dispatcher::FALLBACK_REPLY;
    use crate::utils::clipboard::ClipboardError;
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            if prompt == "fail" {
                return Err(GenerationError::status(500, "boom"));
            }
            Ok(format!("echo: {prompt}\n```sh\nls -la\n```"))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Arc<std::sync::Mutex<Vec<String>>>);

    impl ClipboardSink for RecordingSink {
        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn chat_loop() -> (
        ChatLoop,
        mpsc::UnboundedReceiver<ChatEvent>,
        mpsc::UnboundedReceiver<StoreEvent>,
        RecordingSink,
    ) {
        let (store, store_events) = SessionStore::with_events(SEED_GREETING);
        let dispatcher = MessageDispatcher::new(Arc::new(Mutex::new(store)), Arc::new(EchoGenerator))
            .with_transcript(Arc::new(Mutex::new(TranscriptLog::disabled())));
        let sink = RecordingSink::default();
        let (chat, events) = ChatLoop::new(dispatcher, Box::new(sink.clone()));
        (chat, events, store_events, sink)
    }

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    #[tokio::test]
    async fn message_reply_is_printed_when_settled() {
        let (mut chat, mut events, _store_events, _sink) = chat_loop();
        let mut out = Vec::new();

        let control = chat.handle_line("hello", &mut out).await.unwrap();
        assert_eq!(control, LoopControl::Continue);
        let event = events.recv().await.unwrap();
        chat.handle_event(event, &mut out).await.unwrap();

        let printed = output(out);
        assert!(printed.contains("echo: hello"));
        assert!(printed.contains("│ ls -la"));
        let store = chat.dispatcher.store().lock().await;
        assert_eq!(store.get_active().messages().len(), 3);
    }

    #[tokio::test]
    async fn failed_send_prints_fallback_reply() {
        let (mut chat, mut events, _store_events, _sink) = chat_loop();
        let mut out = Vec::new();

        chat.handle_line("fail", &mut out).await.unwrap();
        let event = events.recv().await.unwrap();
        chat.handle_event(event, &mut out).await.unwrap();

        assert!(output(out).contains(FALLBACK_REPLY));
    }

    #[tokio::test]
    async fn blank_lines_do_nothing() {
        let (mut chat, mut events, _store_events, _sink) = chat_loop();
        let mut out = Vec::new();

        chat.handle_line("   ", &mut out).await.unwrap();
        assert!(out.is_empty());
        assert!(events.try_recv().is_err());
        let store = chat.dispatcher.store().lock().await;
        assert_eq!(store.get_active().messages().len(), 1);
    }

    #[tokio::test]
    async fn copy_targets_whole_reply_or_code_block() {
        let (mut chat, mut events, _store_events, sink) = chat_loop();
        let mut out = Vec::new();

        chat.handle_line("hi", &mut out).await.unwrap();
        let event = events.recv().await.unwrap();
        chat.handle_event(event, &mut out).await.unwrap();

        chat.handle_line("/copy 1", &mut out).await.unwrap();
        chat.handle_line("/copy", &mut out).await.unwrap();
        chat.handle_line("/copy 2", &mut out).await.unwrap();

        let copied = sink.0.lock().unwrap().clone();
        assert_eq!(copied.len(), 2);
        assert_eq!(copied[0], "ls -la");
        assert!(copied[1].starts_with("echo: hi"));
        assert!(output(out).contains("no code block 2"));
    }

    #[tokio::test]
    async fn new_session_becomes_active_and_is_rendered() {
        let (mut chat, mut events, mut store_events, _sink) = chat_loop();
        let mut out = Vec::new();

        chat.handle_line("/new", &mut out).await.unwrap();
        let event = events.recv().await.unwrap();
        chat.handle_event(event, &mut out).await.unwrap();

        let mut rendered = Vec::new();
        while let Ok(event) = store_events.try_recv() {
            chat.handle_store_event(event, &mut rendered).await.unwrap();
        }
        let rendered = output(rendered);
        assert!(rendered.contains("── Chat 2 ──"));
        assert!(rendered.contains("echo: Start a new conversation"));
    }

    #[tokio::test]
    async fn reply_for_background_session_is_announced() {
        let (mut chat, mut events, _store_events, _sink) = chat_loop();
        let mut out = Vec::new();

        chat.handle_line("first", &mut out).await.unwrap();
        let settled = events.recv().await.unwrap();
        {
            let mut store = chat.dispatcher.store().lock().await;
            let id = store.create_session("other").id().clone();
            store.set_active(&id);
        }
        chat.handle_event(settled, &mut out).await.unwrap();

        assert_eq!(output(out), "(new reply in \"New Chat\")\n");
    }

    #[tokio::test]
    async fn switch_and_list_sessions() {
        let (mut chat, _events, _store_events, _sink) = chat_loop();
        {
            let mut store = chat.dispatcher.store().lock().await;
            store.create_session("second");
        }
        let mut out = Vec::new();

        chat.handle_line("/switch 2", &mut out).await.unwrap();
        chat.handle_line("/switch 7", &mut out).await.unwrap();
        chat.handle_line("/sessions", &mut out).await.unwrap();

        let printed = output(out);
        assert!(printed.contains("No conversation matches '7'"));
        assert!(printed.contains("*  2. Chat 2"));
    }

    #[tokio::test]
    async fn dump_and_quit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let (mut chat, _events, _store_events, _sink) = chat_loop();
        let mut out = Vec::new();

        chat.handle_line(&format!("/dump {}", path.display()), &mut out)
            .await
            .unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains(SEED_GREETING));

        let control = chat.handle_line("/quit", &mut out).await.unwrap();
        assert_eq!(control, LoopControl::Quit);
    }

    #[tokio::test]
    async fn log_toggle_without_file_explains() {
        let (mut chat, _events, _store_events, _sink) = chat_loop();
        let mut out = Vec::new();

        chat.handle_line("/log", &mut out).await.unwrap();
        let printed = output(out);
        assert!(printed.contains("No log file specified"));
        assert!(printed.ends_with("Transcript: disabled\n"));
    }

    #[tokio::test]
    async fn log_commands_report_transcript_status() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.log");
        let (mut chat, _events, _store_events, _sink) = chat_loop();

        let mut out = Vec::new();
        chat.handle_line(&format!("/log {}", path.display()), &mut out)
            .await
            .unwrap();
        assert!(output(out).ends_with("Transcript: active (t.log)\n"));

        let mut out = Vec::new();
        chat.handle_line("/log", &mut out).await.unwrap();
        let printed = output(out);
        assert!(printed.starts_with("Logging paused"));
        assert!(printed.ends_with("Transcript: paused (t.log)\n"));
    }

    #[test]
    fn select_copy_text_counts_code_blocks_from_one() {
        let message = Message::assistant("a ```one``` b ```two```");
        let (target, text) = select_copy_text(&message, Some(2)).unwrap();
        assert_eq!(text, "two");
        assert_eq!(target, CopyTarget::segment(message.id(), 3));
        assert!(select_copy_text(&message, Some(3)).is_none());
        assert!(select_copy_text(&message, Some(0)).is_none());
    }
}
