mod chat;
mod client;
pub(crate) mod commands;
pub mod prompt;

pub use chat::ChatSession;
pub use client::AssistantClient;
pub use prompt::SUGGESTED_PROMPTS;
