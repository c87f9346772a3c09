use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::debug;

use super::AgentEvent;
use crate::config::AgentConfig;

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Trait for LLM provider implementations.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream one completion as [`AgentEvent`]s. Always ends with
    /// [`AgentEvent::Done`] unless the transport itself fails.
    async fn call_streaming(
        &self,
        messages: &[serde_json::Value],
        system_prompt: Option<&str>,
        tx: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()>;
}

/// Sampling parameters shared by every provider.
#[derive(Debug, Clone)]
pub struct Sampling {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    sampling: Sampling,
}

impl AnthropicProvider {
    pub fn new(api_key: String, endpoint: String, sampling: Sampling) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint,
            sampling,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn call_streaming(
        &self,
        messages: &[serde_json::Value],
        system_prompt: Option<&str>,
        tx: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()> {
        let mut body = serde_json::json!({
            "model": self.sampling.model,
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
            "messages": messages,
            "stream": true,
        });

        if let Some(system) = system_prompt {
            body["system"] = serde_json::json!(system);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let _ = tx
                .send(AgentEvent::Error(format!("{status}: {text}")))
                .await;
            let _ = tx.send(AgentEvent::Done).await;
            return Ok(());
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut input_tokens: u32 = 0;
        let mut output_tokens: u32 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find("\n\n") {
                let event_text = buffer[..pos].to_string();
                buffer.drain(..pos + 2);

                let mut event_type = String::new();
                let mut data = String::new();
                for line in event_text.lines() {
                    if let Some(et) = line.strip_prefix("event: ") {
                        event_type = et.to_string();
                    } else if let Some(d) = line.strip_prefix("data: ") {
                        data = d.to_string();
                    }
                }

                if data.is_empty() || data == "[DONE]" {
                    continue;
                }

                let parsed: serde_json::Value = match serde_json::from_str(&data) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("skipping unparseable SSE data: {e}");
                        continue;
                    }
                };

                match event_type.as_str() {
                    "message_start" => {
                        if let Some(it) = parsed
                            .pointer("/message/usage/input_tokens")
                            .and_then(|v| v.as_u64())
                        {
                            input_tokens = it as u32;
                        }
                    }

                    "content_block_delta" => {
                        if parsed.pointer("/delta/type").and_then(|t| t.as_str())
                            == Some("text_delta")
                        {
                            if let Some(text) =
                                parsed.pointer("/delta/text").and_then(|t| t.as_str())
                            {
                                let _ = tx.send(AgentEvent::Text(text.into())).await;
                            }
                        }
                    }

                    "message_delta" => {
                        if let Some(ot) = parsed
                            .pointer("/usage/output_tokens")
                            .and_then(|v| v.as_u64())
                        {
                            output_tokens = ot as u32;
                        }
                    }

                    "error" => {
                        let message = parsed
                            .pointer("/error/message")
                            .and_then(|m| m.as_str())
                            .unwrap_or("unknown provider error");
                        let _ = tx.send(AgentEvent::Error(message.to_string())).await;
                    }

                    "message_stop" => {
                        let _ = tx
                            .send(AgentEvent::Usage {
                                input_tokens,
                                output_tokens,
                            })
                            .await;
                        let _ = tx.send(AgentEvent::Done).await;
                        return Ok(());
                    }

                    _ => {}
                }
            }
        }

        let _ = tx
            .send(AgentEvent::Usage {
                input_tokens,
                output_tokens,
            })
            .await;
        let _ = tx.send(AgentEvent::Done).await;
        Ok(())
    }
}

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    sampling: Sampling,
}

impl OpenAiProvider {
    pub fn new(api_key: String, endpoint: String, sampling: Sampling) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint,
            sampling,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn call_streaming(
        &self,
        messages: &[serde_json::Value],
        system_prompt: Option<&str>,
        tx: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()> {
        let mut all_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system_prompt {
            all_messages.push(serde_json::json!({
                "role": "system",
                "content": system,
            }));
        }
        all_messages.extend_from_slice(messages);

        let body = serde_json::json!({
            "model": self.sampling.model,
            "messages": all_messages,
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let _ = tx
                .send(AgentEvent::Error(format!("{status}: {text}")))
                .await;
            let _ = tx.send(AgentEvent::Done).await;
            return Ok(());
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut input_tokens: u32 = 0;
        let mut output_tokens: u32 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find("\n\n") {
                let event = buffer[..pos].to_string();
                buffer.drain(..pos + 2);

                let Some(data) = event.strip_prefix("data: ") else {
                    continue;
                };

                if data == "[DONE]" {
                    let _ = tx
                        .send(AgentEvent::Usage {
                            input_tokens,
                            output_tokens,
                        })
                        .await;
                    let _ = tx.send(AgentEvent::Done).await;
                    return Ok(());
                }

                let parsed: serde_json::Value = match serde_json::from_str(data) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("skipping unparseable SSE data: {e}");
                        continue;
                    }
                };

                if let Some(usage) = parsed.get("usage") {
                    if let Some(it) = usage.get("prompt_tokens").and_then(|v| v.as_u64()) {
                        input_tokens = it as u32;
                    }
                    if let Some(ot) = usage.get("completion_tokens").and_then(|v| v.as_u64()) {
                        output_tokens = ot as u32;
                    }
                }

                if let Some(text) = parsed
                    .pointer("/choices/0/delta/content")
                    .and_then(|c| c.as_str())
                {
                    let _ = tx.send(AgentEvent::Text(text.into())).await;
                }
            }
        }

        let _ = tx
            .send(AgentEvent::Usage {
                input_tokens,
                output_tokens,
            })
            .await;
        let _ = tx.send(AgentEvent::Done).await;
        Ok(())
    }
}

/// Resolve the endpoint for a provider: config first, then
/// `WAYFINDER_<PROVIDER>_ENDPOINT`, then the public API.
pub fn endpoint_for(config: &AgentConfig) -> String {
    if let Some(endpoint) = config.endpoint.clone() {
        return endpoint;
    }
    let (var, fallback) = match config.provider.as_str() {
        "anthropic" => ("WAYFINDER_ANTHROPIC_ENDPOINT", ANTHROPIC_ENDPOINT),
        _ => ("WAYFINDER_OPENAI_ENDPOINT", OPENAI_ENDPOINT),
    };
    std::env::var(var).unwrap_or_else(|_| fallback.to_string())
}

/// Create a provider from config.
pub fn from_config(config: &AgentConfig) -> anyhow::Result<Box<dyn LlmProvider>> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "no API key for provider '{}'. Set {} env var.",
            config.provider,
            match config.provider.as_str() {
                "anthropic" => "ANTHROPIC_API_KEY",
                "openai" => "OPENAI_API_KEY",
                _ => "the appropriate API key",
            }
        )
    })?;

    let sampling = Sampling {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    };
    let endpoint = endpoint_for(config);

    match config.provider.as_str() {
        "anthropic" => Ok(Box::new(AnthropicProvider::new(api_key, endpoint, sampling))),
        "openai" => Ok(Box::new(OpenAiProvider::new(api_key, endpoint, sampling))),
        other => anyhow::bail!("unknown provider: {other}"),
    }
}
