//! Terminal UI layer for interactive chat sessions.
//!
//! This layer presents and captures interaction state, while
//! [`crate::core`] owns conversation logic and the outbound call path.

pub mod chat_loop;
