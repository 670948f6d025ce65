use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::chatbot::prompts::{ASSISTANT_SYSTEM, FALLBACK_REPLY};
use crate::errors::AppError;
use crate::llm_client::{ChatMessage, LlmError, Role};
use crate::state::AppState;

/// Turns of prior conversation forwarded to the model.
const HISTORY_TURNS: usize = 6;

#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    pub sender: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// System prompt, the last six history turns, then the new message.
/// Any sender other than `user` is replayed as the assistant.
pub fn build_messages(history: &[HistoryEntry], message: &str) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(HISTORY_TURNS);
    let mut messages = Vec::with_capacity(HISTORY_TURNS + 2);
    messages.push(ChatMessage::new(Role::System, ASSISTANT_SYSTEM));
    messages.extend(history[start..].iter().map(|turn| {
        let role = if turn.sender == "user" {
            Role::User
        } else {
            Role::Assistant
        };
        ChatMessage::new(role, turn.text.as_str())
    }));
    messages.push(ChatMessage::new(Role::User, message));
    messages
}

/// POST /api/chatbot
pub async fn handle_chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let llm = state
        .llm
        .as_ref()
        .ok_or_else(|| AppError::NotConfigured("Chat assistant not configured".to_string()))?;

    let message = req.message.as_deref().map(str::trim).unwrap_or("");
    if message.is_empty() {
        return Err(AppError::validation("Message is required"));
    }

    let messages = build_messages(&req.conversation_history, message);
    info!(
        "Chat request from user {} ({} history turns)",
        user.id,
        messages.len() - 2
    );

    let response = match llm.reply(&messages).await {
        Ok(text) => text,
        Err(LlmError::EmptyContent) => FALLBACK_REPLY.to_string(),
        Err(e) => return Err(AppError::Upstream(e.to_string())),
    };

    Ok(Json(ChatResponse { response }))
}
