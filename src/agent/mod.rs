pub mod providers;

use regex::Regex;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::documents::Chunk;
use crate::types::{ChatTurn, Location};

/// Reply when the browser sends no usable history.
pub const INVALID_HISTORY_REPLY: &str = "Please send a valid chat history.";
/// Reply when the latest turn is not a non-blank user message.
pub const INVALID_QUESTION_REPLY: &str = "Please ask a valid question.";
/// Context used when no document or location matches the question.
pub const NO_CONTEXT: &str = "No context found.";

/// A streaming chunk from the LLM.
#[derive(Debug)]
pub enum AgentEvent {
    Text(String),
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    Done,
    Error(String),
}

/// Answers one chat request: validates the history, assembles the prompt and
/// asks the configured provider.
pub struct ChatResponder {
    config: AgentConfig,
}

impl ChatResponder {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answer with the provider built from config. Never fails: provider and
    /// transport errors become the reply text.
    pub async fn respond(&self, history: &[ChatTurn], context: &str) -> String {
        match providers::from_config(&self.config) {
            Ok(provider) => self.respond_with(provider.as_ref(), history, context).await,
            Err(e) => {
                warn!("provider unavailable: {e}");
                format!("Error generating answer: {e}")
            }
        }
    }

    pub async fn respond_with(
        &self,
        provider: &dyn providers::LlmProvider,
        history: &[ChatTurn],
        context: &str,
    ) -> String {
        if let Err(reply) = latest_question(history) {
            return reply.to_string();
        }

        let messages = build_messages(history, self.config.history_window);
        let system_prompt = build_system_prompt(&self.config.system_prompt, context);

        match collect_reply(provider, &messages, Some(&system_prompt)).await {
            Ok(raw) => {
                let reply = strip_think(&raw);
                info!(
                    model = %self.config.model,
                    turns = messages.len(),
                    reply_chars = reply.len(),
                    "chat reply generated"
                );
                reply
            }
            Err(e) => {
                warn!(model = %self.config.model, "chat generation failed: {e}");
                format!("Error generating answer: {e}")
            }
        }
    }
}

/// The question to answer: the content of the last turn, which must come
/// from the user and not be blank. `Err` carries the canned reply to send
/// instead.
pub fn latest_question(history: &[ChatTurn]) -> Result<&str, &'static str> {
    let last = history.last().ok_or(INVALID_HISTORY_REPLY)?;
    if !last.is_user() || last.content.trim().is_empty() {
        return Err(INVALID_QUESTION_REPLY);
    }
    Ok(last.content.trim())
}

/// Provider messages for the trailing `window` turns. Turns with other roles
/// are dropped, and so are leading assistant turns since providers expect the
/// conversation to open with the user.
pub fn build_messages(history: &[ChatTurn], window: usize) -> Vec<serde_json::Value> {
    let turns: Vec<&ChatTurn> = history
        .iter()
        .filter(|t| t.as_provider_message().is_some())
        .collect();
    let start = turns.len().saturating_sub(window.max(1));

    turns[start..]
        .iter()
        .skip_while(|t| !t.is_user())
        .filter_map(|t| t.as_provider_message())
        .collect()
}

pub fn build_system_prompt(system_prompt: &str, context: &str) -> String {
    format!(
        "{}\n\nRelevant context from documents:\n{context}",
        system_prompt.trim()
    )
}

/// One line per location, or [`NO_CONTEXT`].
pub fn format_context(locations: &[&Location]) -> String {
    if locations.is_empty() {
        return NO_CONTEXT.to_string();
    }
    locations
        .iter()
        .map(|l| {
            if l.details.is_empty() {
                format!("{} ({}, {})", l.name, l.lat, l.lon)
            } else {
                format!("{}: {} ({}, {})", l.name, l.details, l.lat, l.lon)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Context block for the model: matching document chunks separated by blank
/// lines, then the matching locations. [`NO_CONTEXT`] when both are empty.
pub fn build_context(documents: &[&Chunk], locations: &[&Location]) -> String {
    let mut sections: Vec<String> = documents.iter().map(|c| c.text.clone()).collect();
    if !locations.is_empty() {
        sections.push(format_context(locations));
    }
    if sections.is_empty() {
        return NO_CONTEXT.to_string();
    }
    sections.join("\n\n")
}

fn think_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("think pattern"))
}

/// Remove reasoning blocks some models emit before the answer.
pub fn strip_think(text: &str) -> String {
    think_re().replace_all(text, "").trim().to_string()
}

/// Run one streaming call to completion and return the concatenated text.
///
/// The stream is drained while the provider is still sending, so a long reply
/// never stalls on channel capacity. A streamed error becomes `Err`.
pub async fn collect_reply(
    provider: &dyn providers::LlmProvider,
    messages: &[serde_json::Value],
    system_prompt: Option<&str>,
) -> anyhow::Result<String> {
    let (tx, mut rx) = mpsc::channel::<AgentEvent>(32);

    let call = provider.call_streaming(messages, system_prompt, tx);
    let drain = async move {
        let mut text = String::new();
        let mut error = None;
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::Text(chunk) => text.push_str(&chunk),
                AgentEvent::Usage {
                    input_tokens,
                    output_tokens,
                } => debug!(input_tokens, output_tokens, "provider usage"),
                AgentEvent::Error(e) => error = Some(e),
                AgentEvent::Done => break,
            }
        }
        (text, error)
    };

    let (result, (text, error)) = tokio::join!(call, drain);
    result?;
    if let Some(e) = error {
        anyhow::bail!("{e}");
    }
    Ok(text)
}
