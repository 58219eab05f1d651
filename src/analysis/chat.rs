//! First-aid chat.

use tracing::{info, instrument};

use super::{Analyzed, Gateway};
use crate::fallback;
use crate::model::{ChatMessage, ChatRole};

const SYSTEM_PROMPT: &str = "You are a helpful medical chatbot providing first-aid guidance \
                             and health advice. Be concise and helpful.";

/// Number of prior turns forwarded to the model.
pub const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct ChatAssistant {
    gateway: Gateway,
}

impl ChatAssistant {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Reply to `message` given the prior conversation.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn reply(&self, message: &str, history: &[ChatMessage]) -> Analyzed<String> {
        let answer = self
            .gateway
            .complete_text("chat", build_messages(message, history))
            .await
            .filter(|text| !text.trim().is_empty());

        let outcome = Analyzed::or_fallback(answer, || fallback::chat_reply(message).to_string());
        info!(source = ?outcome.source, "Chat reply ready");
        outcome
    }
}

/// System instruction, the most recent history, then the new message.
///
/// Client-supplied system turns are dropped so the instruction cannot be
/// overridden from the request body.
fn build_messages(message: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
    let turns: Vec<&ChatMessage> = history
        .iter()
        .filter(|m| m.role != ChatRole::System)
        .collect();
    let recent = &turns[turns.len().saturating_sub(HISTORY_WINDOW)..];

    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(recent.iter().map(|m| (*m).clone()));
    messages.push(ChatMessage::user(message));
    messages
}
