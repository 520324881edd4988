//! Wire payloads for the generation endpoint and the client that sends them.

pub mod generate;

use serde::{Deserialize, Serialize};

pub use generate::{GenerationError, GenerationErrorKind, Generator, HttpGenerator};

/// Path appended to the configured base URL for every generation call.
pub const GENERATE_PATH: &str = "generate";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub stream: bool,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, model: Option<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model,
            stream: false,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct GenerateResponse {
    pub response: String,
}
