pub mod clipboard;
pub mod diagnostics;
pub mod logging;
pub mod url;
