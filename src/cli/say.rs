//! Non-interactive "say" command: one prompt, one reply, then exit.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::HttpGenerator;
use crate::core::clipboard::ClipboardController;
use crate::core::config::ResolvedConfig;
use crate::core::dispatcher::{MessageDispatcher, SEED_GREETING};
use crate::core::session::SessionStore;
use crate::ui::renderer::render_message;

pub async fn run_say(prompt: Vec<String>, resolved: ResolvedConfig) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: nestchat say <prompt>");
        std::process::exit(1);
    }

    let generator = HttpGenerator::new(
        &resolved.base_url,
        resolved.model.clone(),
        resolved.request_timeout,
    )?;
    let store = Arc::new(Mutex::new(SessionStore::new(SEED_GREETING)));
    let dispatcher = MessageDispatcher::new(store, Arc::new(generator));

    let Ok(settled) = dispatcher.send(prompt).await else {
        std::process::exit(1);
    };
    if let Some(err) = settled.reply.error() {
        eprintln!("❌ Failed to reach {}: {err}", resolved.base_url);
        std::process::exit(1);
    }

    print!(
        "{}",
        render_message(&settled.assistant_message, &ClipboardController::new())
    );
    Ok(())
}
