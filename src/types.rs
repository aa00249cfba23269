use serde::Deserialize;

/// One part of a request sent to the AI backend. Text for normal chat,
/// audio for voice notes forwarded as-is.
#[derive(Debug, Clone)]
pub enum RequestPart {
    Text(String),
    Audio { mime_type: String, data: Vec<u8> },
}

/// An inbound chat message as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: String,
    pub parts: Vec<RequestPart>,
}

impl InboundMessage {
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            parts: vec![RequestPart::Text(text.into())],
        }
    }
}

/// Generation parameters for the AI backend. Hashed into the model
/// fingerprint, so equal configs must hash identically.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub system_instruction: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            system_instruction: String::new(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_temperature() -> f32 {
    0.9
}
fn default_top_k() -> u32 {
    40
}
fn default_top_p() -> f32 {
    0.95
}
fn default_max_output_tokens() -> u32 {
    2048
}
