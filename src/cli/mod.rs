//! Command-line interface parsing and startup wiring
//!
//! This module parses arguments, resolves configuration and the API
//! credential, and dispatches into the interactive chat loop.

use std::env;
use std::error::Error;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::core::chat_call::{RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::core::config::Config;
use crate::ui::chat_loop::{run_chat, ChatSetup};

#[derive(Parser)]
#[command(name = "bavard")]
#[command(about = "A terminal-based chat client for Google's generative-language API")]
#[command(
    long_about = "Bavard is a full-screen terminal chat client that forwards your messages \
to Google's generative-language API and renders the replies inline.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    Your API key (required, never stored on disk)\n\n\
Controls:\n\
  Type              Enter your message in the input field\n\
  Enter             Send the message\n\
  Up/Down/Mouse     Scroll through chat history\n\
  Ctrl+C            Quit the application\n\
  Backspace         Delete characters in the input field"
)]
pub struct Args {
    /// Model to chat with (overrides the configured default)
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append a plain-text transcript of the session to this file
    #[arg(short = 'l', long, value_name = "FILE")]
    pub log: Option<String>,

    /// API base URL override (defaults to the public endpoint)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load()?;

    let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
        "❌ Error: GEMINI_API_KEY environment variable not set\n\n\
         Please set your API key:\n\
         export GEMINI_API_KEY=\"your-api-key-here\""
    })?;

    let setup = ChatSetup {
        base_url: args
            .base_url
            .unwrap_or_else(|| config.base_url().to_string()),
        model: args.model.unwrap_or_else(|| config.model().to_string()),
        api_key,
        retry_policy: retry_policy_from(&config),
        log_file: args.log,
    };

    run_chat(setup).await
}

fn retry_policy_from(config: &Config) -> RetryPolicy {
    RetryPolicy {
        attempts: config.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
        delay: config
            .retry_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY),
    }
}
