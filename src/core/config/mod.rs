pub mod data;
pub mod io;
pub mod printing;

pub use data::{Config, ConfigKey, ConfigOverrides, ResolvedConfig, ValueSource};
pub use io::ConfigError;
