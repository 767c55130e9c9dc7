pub mod chat_call;
pub mod config;
pub mod conversation;
pub mod message;
