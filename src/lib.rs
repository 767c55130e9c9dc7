//! Bavard is a terminal-first chat client for Google's generative-language API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns conversation state, configuration, and the outbound
//!   call path with its retry policy.
//! - [`ui`] renders the terminal interface and runs the interactive event
//!   loop that drives user input and display updates.
//! - [`api`] defines the `generateContent` wire payloads and the tolerant
//!   reply extraction used by the call path.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which initializes and dispatches into
//! [`ui::chat_loop`] for interactive sessions.

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
