use crate::core::config::data::{Config, ResolvedConfig};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset)"),
        }
        match &self.model {
            Some(model) => println!("  model: {model}"),
            None => println!("  model: (unset)"),
        }
        match self.request_timeout_secs {
            Some(secs) => println!("  request-timeout: {secs}s"),
            None => println!("  request-timeout: (unset)"),
        }
    }
}

impl ResolvedConfig {
    pub fn print_effective(&self) {
        println!("Effective settings:");
        println!("  base-url: {} ({})", self.base_url, self.base_url_source);
        match &self.model {
            Some(model) => println!("  model: {model}"),
            None => println!("  model: (server default)"),
        }
        println!("  request-timeout: {}s", self.request_timeout.as_secs());
    }
}
