pub mod clipboard;
pub mod config;
pub mod dispatcher;
pub mod formatter;
pub mod message;
pub mod session;
