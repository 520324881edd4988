//! nestchat is a terminal chat client that keeps several independent
//! conversations with a remote text-generation service.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session store, the send pipeline, response
//!   formatting, copy feedback and configuration.
//! - [`api`] defines the generation payloads and the HTTP client behind the
//!   [`api::Generator`] trait.
//! - [`ui`] renders messages as plain text and runs the line-mode chat loop.
//! - [`commands`] parses slash commands typed at the prompt.
//! - [`utils`] holds the clipboard bridge, transcript logging, diagnostics
//!   setup and URL helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
