use serde::{Deserialize, Serialize};

/// A point of interest shown in the location browser.
///
/// Wire format: `{"name": "...", "details": "...", "lat": 34.07, "lon": 74.81}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub details: String,
    pub lat: f64,
    pub lon: f64,
}

/// One turn of the running conversation the browser keeps and resends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    #[serde(alias = "message", default)]
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    /// Convert to the `{role, content}` shape both providers accept.
    pub fn as_provider_message(&self) -> Option<serde_json::Value> {
        match self.role.as_str() {
            "user" | "assistant" => Some(serde_json::json!({
                "role": self.role,
                "content": self.content,
            })),
            _ => None,
        }
    }
}

/// Body of `POST /user/chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Response of `POST /user/chat`. `html` is `reply` passed through the
/// message renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub html: String,
}

impl ChatReply {
    pub fn new(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        let html = crate::render::render(&reply);
        Self { reply, html }
    }
}

/// Body of `POST /render`.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResponse {
    pub html: String,
}
