//! API request and response types

use crate::conversation::{ConversationSnapshot, SettingsBounds};
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Slider positions for one session
#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Response for session creation
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub session: ConversationSnapshot,
}

/// Model and slider metadata for the page
#[derive(Debug, Serialize)]
pub struct SettingsInfoResponse {
    pub model: String,
    pub bounds: SettingsBounds,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
