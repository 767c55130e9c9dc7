//! Wire types for the generative-language `generateContent` endpoint.
//!
//! Request bodies carry the conversation turns; response bodies are parsed
//! tolerantly, because the API reports some failures inside a 200 payload
//! and replies are occasionally missing the expected candidate path.

use serde::{Deserialize, Serialize};

/// Shown in the transcript when a successful response carries no usable
/// reply text and no embedded error message.
pub const EMPTY_REPLY_FALLBACK: &str = "No response from Gemini.";

#[derive(Serialize, Clone)]
pub struct RequestPart {
    pub text: String,
}

#[derive(Serialize, Clone)]
pub struct RequestContent {
    pub role: String,
    pub parts: Vec<RequestPart>,
}

#[derive(Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<RequestContent>,
}

impl GenerateRequest {
    /// Build a request carrying `prompt` as the sole user turn.
    pub fn from_prompt(prompt: &str) -> Self {
        GenerateRequest {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

#[derive(Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
pub struct CandidatePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
}

impl GenerateResponse {
    /// Reply text with the tolerant fallback chain: the first candidate's
    /// first part, then the embedded error message, then
    /// [`EMPTY_REPLY_FALLBACK`]. Missing data degrades, it never fails.
    pub fn reply_text(&self) -> String {
        self.candidate_text()
            .or_else(|| self.error_message())
            .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string())
    }

    fn candidate_text(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .clone()
    }

    fn error_message(&self) -> Option<String> {
        self.error.as_ref()?.message.clone()
    }
}
