//! Command-line argument parsing and subcommand dispatch.

pub mod say;

use std::error::Error;

use clap::{Parser, Subcommand};

use crate::cli::say::run_say;
use crate::core::config::{Config, ConfigKey, ConfigOverrides};
use crate::ui::chat_loop::run_chat;
use crate::utils::diagnostics;

#[derive(Parser, Debug)]
#[command(name = "nestchat")]
#[command(version)]
#[command(about = "A terminal chat client with several independent conversations")]
#[command(
    long_about = "nestchat keeps several independent conversations with a text-generation \
service. Each prompt is sent on its own; replies land in the conversation the prompt \
was typed into, even if you have switched away.\n\n\
Environment Variables:\n\
  NEST_API_URL      Base URL of the generation service (default http://127.0.0.1:11434/api)\n\
  NEST_MODEL        Model name sent with each request (optional)\n\
  NEST_CONFIG_DIR   Directory holding config.toml\n\
  NEST_LOG          Diagnostic log filter, e.g. nestchat=debug\n\n\
Commands:\n\
  /help             List chat commands\n\
  /new              Start a new conversation\n\
  /sessions         List conversations\n\
  /switch <n>       Switch conversation\n\
  /copy [n]         Copy the last reply or its n-th code block\n\
  /log <filename>   Enable logging to specified file\n\
  /log              Toggle logging pause/resume\n\
  /dump [filename]  Write the conversation to a file\n\
  /quit             Leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Base URL of the generation service
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Model to request
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true)]
    pub log: Option<String>,

    /// Print debug diagnostics to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Send a single prompt and print the reply
    Say {
        /// Prompt text; multiple words are joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Show stored and effective configuration
    Config,
    /// Set configuration values
    Set {
        /// Configuration key to set (base-url, model, request-timeout)
        key: String,
        /// Value to set for the key
        value: String,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    diagnostics::init(args.verbose);

    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let overrides = ConfigOverrides {
        base_url: args.base_url,
        model: args.model,
    };

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Config => {
            let config = Config::load()?;
            config.print_all();
            println!();
            config.resolve_from_env(&overrides).print_effective();
            Ok(())
        }
        Commands::Set { key, value } => {
            let key = parse_key(&key);
            let mut config = Config::load()?;
            if let Err(err) = config.set_value(key, &value) {
                eprintln!("❌ Invalid value for {}: {err}", key.as_str());
                std::process::exit(1);
            }
            let path = config.save()?;
            tracing::debug!(path = %path.display(), "saved config");
            println!("✅ Set {} to: {}", key.as_str(), value.trim());
            Ok(())
        }
        Commands::Unset { key } => {
            let key = parse_key(&key);
            let mut config = Config::load()?;
            config.unset_value(key);
            config.save()?;
            println!("✅ Unset {}", key.as_str());
            Ok(())
        }
        Commands::Say { prompt } => {
            let resolved = Config::load()?.resolve_from_env(&overrides);
            run_say(prompt, resolved).await
        }
        Commands::Chat => {
            let resolved = Config::load()?.resolve_from_env(&overrides);
            run_chat(resolved, args.log).await
        }
    }
}

fn parse_key(key: &str) -> ConfigKey {
    match key.parse::<ConfigKey>() {
        Ok(key) => key,
        Err(unknown) => {
            let known: Vec<&str> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
            eprintln!("❌ Unknown config key: {unknown}");
            eprintln!("Known keys: {}", known.join(", "));
            std::process::exit(1);
        }
    }
}
