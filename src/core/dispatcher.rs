//! Send pipeline: validate a prompt, append it to the active session right
//! away, ask the generator for a reply, then append the reply (or a fixed
//! fallback) to the same session.
//!
//! A send moves through three phases. [`MessageDispatcher::submit`] is the
//! `Idle -> Sending` step and returns an [`InFlightSend`];
//! [`InFlightSend::settle`] performs the network call and yields a
//! [`SettledSend`]. The store lock is released while the call is pending, so
//! several sends can be in flight and their replies land in completion order.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::{GenerationError, Generator};
use crate::core::message::{Message, MessageId};
use crate::core::session::{SessionId, SessionStore};
use crate::utils::logging::TranscriptLog;

pub const SEED_GREETING: &str = "Welcome to the Nest. How can I assist you today?";
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I couldn't process your request at the moment. Please try again later.";
pub const FALLBACK_GREETING: &str = "Welcome to a new conversation. How can I help you?";
pub const NEW_SESSION_PROMPT: &str = "Start a new conversation";

pub type SharedStore = Arc<Mutex<SessionStore>>;
pub type SharedTranscript = Arc<Mutex<TranscriptLog>>;

/// The prompt was empty or whitespace. Nothing was changed; callers are
/// expected to ignore this silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRejected;

impl fmt::Display for ValidationRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("prompt is empty")
    }
}

impl StdError for ValidationRejected {}

/// Where an assistant message came from.
#[derive(Debug)]
pub enum Reply {
    Generated,
    Fallback(GenerationError),
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Reply::Fallback(_))
    }

    pub fn error(&self) -> Option<&GenerationError> {
        match self {
            Reply::Generated => None,
            Reply::Fallback(err) => Some(err),
        }
    }
}

#[derive(Clone)]
pub struct MessageDispatcher {
    store: SharedStore,
    generator: Arc<dyn Generator>,
    transcript: Option<SharedTranscript>,
}

impl MessageDispatcher {
    pub fn new(store: SharedStore, generator: Arc<dyn Generator>) -> Self {
        Self {
            store,
            generator,
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: SharedTranscript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn transcript(&self) -> Option<&SharedTranscript> {
        self.transcript.as_ref()
    }

    /// Start a send from the pending input buffer.
    ///
    /// Blank input is rejected and left in place. Otherwise the buffer is
    /// cleared and the user message is already in the active session when
    /// this returns.
    pub async fn submit(&self, input: &mut String) -> Result<InFlightSend, ValidationRejected> {
        if input.trim().is_empty() {
            return Err(ValidationRejected);
        }
        let prompt = std::mem::take(input);
        let user_message = Message::user(prompt.clone());
        let user_message_id = user_message.id().clone();

        let session_id = {
            let mut store = self.store.lock().await;
            let session_id = store.active_id().clone();
            append_or_log(&mut store, &session_id, user_message.clone());
            session_id
        };
        log_to_transcript(self.transcript.as_ref(), &user_message).await;
        tracing::debug!(session = %session_id, message = %user_message_id, "send started");

        Ok(InFlightSend {
            dispatcher: self.clone(),
            session_id,
            user_message_id,
            prompt,
        })
    }

    /// Submit and settle in one go.
    pub async fn send(&self, prompt: impl Into<String>) -> Result<SettledSend, ValidationRejected> {
        let mut buffer = prompt.into();
        let in_flight = self.submit(&mut buffer).await?;
        Ok(in_flight.settle().await)
    }

    /// Ask the generator for a greeting, create a session around it (or
    /// around the fallback greeting) and make it active.
    pub async fn new_session(&self) -> NewSession {
        let (greeting_text, greeting) = match self.generator.generate(NEW_SESSION_PROMPT).await {
            Ok(text) => (text, Reply::Generated),
            Err(err) => {
                tracing::warn!(error = %err, "using fallback greeting for new session");
                (FALLBACK_GREETING.to_string(), Reply::Fallback(err))
            }
        };

        let (session_id, title, greeting_message) = {
            let mut store = self.store.lock().await;
            let session = store.create_session(greeting_text);
            let session_id = session.id().clone();
            let title = session.title().to_string();
            let greeting_message = session.messages()[0].clone();
            store.set_active(&session_id);
            (session_id, title, greeting_message)
        };

        if let Some(transcript) = &self.transcript {
            let log = transcript.lock().await;
            let result = log
                .log_session_switch(&title)
                .and_then(|_| log.log_message(&greeting_message));
            if let Err(err) = result {
                tracing::warn!(error = %err, "failed to write transcript");
            }
        }

        NewSession {
            session_id,
            title,
            greeting,
        }
    }
}

/// A send whose user message is stored and whose reply is still pending.
pub struct InFlightSend {
    dispatcher: MessageDispatcher,
    session_id: SessionId,
    user_message_id: MessageId,
    prompt: String,
}

impl InFlightSend {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn user_message_id(&self) -> &MessageId {
        &self.user_message_id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Run the single generation attempt and append exactly one assistant
    /// message to the session the prompt went to.
    pub async fn settle(self) -> SettledSend {
        let InFlightSend {
            dispatcher,
            session_id,
            user_message_id,
            prompt,
        } = self;

        let (assistant_message, reply) = match dispatcher.generator.generate(&prompt).await {
            Ok(text) => (Message::assistant(text), Reply::Generated),
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "using fallback reply");
                (Message::assistant(FALLBACK_REPLY), Reply::Fallback(err))
            }
        };

        {
            let mut store = dispatcher.store.lock().await;
            append_or_log(&mut store, &session_id, assistant_message.clone());
        }
        log_to_transcript(dispatcher.transcript.as_ref(), &assistant_message).await;
        tracing::debug!(session = %session_id, fallback = reply.is_fallback(), "send settled");

        SettledSend {
            session_id,
            user_message_id,
            assistant_message,
            reply,
        }
    }
}

/// Outcome of a completed send.
#[derive(Debug)]
pub struct SettledSend {
    pub session_id: SessionId,
    pub user_message_id: MessageId,
    pub assistant_message: Message,
    pub reply: Reply,
}

/// Outcome of the new-session flow.
#[derive(Debug)]
pub struct NewSession {
    pub session_id: SessionId,
    pub title: String,
    pub greeting: Reply,
}

fn append_or_log(store: &mut SessionStore, session_id: &SessionId, message: Message) {
    // Sessions are never removed, so this only fails on a programming error.
    if let Err(err) = store.append_message(session_id, message) {
        tracing::error!(error = %err, "dropping message for missing session");
    }
}

async fn log_to_transcript(transcript: Option<&SharedTranscript>, message: &Message) {
    if let Some(transcript) = transcript {
        if let Err(err) = transcript.lock().await.log_message(message) {
            tracing::warn!(error = %err, "failed to write transcript");
        }
    }
}
