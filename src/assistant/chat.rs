use crate::{
    db::Database,
    history::try_load_history,
    models::{ChatMessage, WaterQualityRecord},
};

use super::{
    client::AssistantClient,
    prompt::{CHAT_ERROR_MESSAGE, GREETING},
};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Append-only assistant transcript.
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::model(GREETING)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Send `prompt` and append both sides of the exchange. Blank input is
    /// ignored and returns `None`.
    pub async fn ask(
        &mut self,
        assistant: &AssistantClient,
        prompt: &str,
        records: &[WaterQualityRecord],
    ) -> Option<&ChatMessage> {
        if prompt.trim().is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::user(prompt));
        let reply = assistant.respond(prompt, records).await;
        self.messages.push(ChatMessage::model(reply));
        self.messages.last()
    }

    /// Reload history for the next questions. On failure the transcript gets
    /// an error message and `None` is returned; the caller keeps its data.
    pub async fn refresh_records(
        &mut self,
        db: &Database,
        limit: usize,
    ) -> Option<Vec<WaterQualityRecord>> {
        match try_load_history(db, limit).await {
            Ok(records) => Some(records),
            Err(err) => {
                log_warn!("assistant refresh failed: {err:?}");
                self.messages.push(ChatMessage::model(CHAT_ERROR_MESSAGE));
                None
            }
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
