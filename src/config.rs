use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WayfinderConfig {
    pub gateway: GatewayConfig,
    pub agent: AgentConfig,
    pub locations: LocationsConfig,
    pub documents: DocumentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

fn default_port() -> u16 {
    5000
}
fn default_bind() -> String {
    "127.0.0.1".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Overrides the provider's public API URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// How many trailing turns of the browser's history reach the model.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// How many locations are offered to the model as context.
    #[serde(default = "default_context_locations")]
    pub context_locations: usize,
    /// How many knowledge-base chunks are offered to the model as context.
    #[serde(default = "default_context_documents")]
    pub context_documents: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            endpoint: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            history_window: default_history_window(),
            context_locations: default_context_locations(),
            context_documents: default_context_documents(),
        }
    }
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    250
}
fn default_temperature() -> f32 {
    0.6
}
fn default_system_prompt() -> String {
    "You are a helpful campus guide. Only answer questions about the campus, \
     its places, facilities, staff, departments, courses, events and contact \
     details. Give only the specific information requested. If a question is \
     unrelated, or you do not have the information, politely decline and do \
     not make up an answer."
        .into()
}
fn default_history_window() -> usize {
    6
}
fn default_context_locations() -> usize {
    5
}
fn default_context_documents() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsConfig {
    /// Directory of `*.json` and `*.csv` location catalogues.
    #[serde(default = "default_locations_dir")]
    pub dir: PathBuf,
}

impl Default for LocationsConfig {
    fn default() -> Self {
        Self {
            dir: default_locations_dir(),
        }
    }
}

fn default_locations_dir() -> PathBuf {
    PathBuf::from("knowledge_base/locations")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Directory of `*.txt`, `*.md` and `*.csv` knowledge-base documents.
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("knowledge_base/docs")
}

const VALID_PROVIDERS: [&str; 2] = ["anthropic", "openai"];

/// Load configuration from file or use defaults.
///
/// Search order:
/// 1. `WAYFINDER_CONFIG` env var
/// 2. `~/.wayfinder/config.toml`
/// 3. Zero-config defaults (no file needed)
pub fn load() -> anyhow::Result<WayfinderConfig> {
    let path = config_path();

    if path.exists() {
        let mut config = load_from_path(&path)?;
        resolve_api_key(&mut config);
        info!("loaded config from {}", path.display());
        Ok(config)
    } else {
        info!("no config file found, using zero-config defaults");
        let mut config = WayfinderConfig::default();
        resolve_api_key(&mut config);
        Ok(config)
    }
}

/// Parse and validate a config file without consulting the environment.
pub fn load_from_path(path: &Path) -> anyhow::Result<WayfinderConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let config: WayfinderConfig = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;
    validate(&config)?;
    Ok(config)
}

pub fn save_to_path(config: &WayfinderConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("failed to create {}: {e}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
    std::fs::write(path, content)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("WAYFINDER_CONFIG") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
    PathBuf::from(home).join(".wayfinder").join("config.toml")
}

/// Resolve API key from environment variables if not set in config.
fn resolve_api_key(config: &mut WayfinderConfig) {
    if config.agent.api_key.is_none() {
        config.agent.api_key = match config.agent.provider.as_str() {
            "anthropic" => std::env::var("ANTHROPIC_API_KEY").ok(),
            "openai" => std::env::var("OPENAI_API_KEY").ok(),
            _ => None,
        };
    }
}

/// Validate the config and return clear error messages.
pub fn validate(config: &WayfinderConfig) -> anyhow::Result<()> {
    if !VALID_PROVIDERS.contains(&config.agent.provider.as_str()) {
        anyhow::bail!(
            "invalid provider '{}': must be one of {:?}",
            config.agent.provider,
            VALID_PROVIDERS
        );
    }

    if config.agent.max_tokens == 0 {
        anyhow::bail!("agent.max_tokens must be > 0");
    }

    if !(0.0..=2.0).contains(&config.agent.temperature) {
        anyhow::bail!(
            "agent.temperature must be between 0.0 and 2.0, got {}",
            config.agent.temperature
        );
    }

    if let Some(endpoint) = config.agent.endpoint.as_deref() {
        let url = url::Url::parse(endpoint)
            .map_err(|e| anyhow::anyhow!("agent.endpoint '{endpoint}' is not a valid URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("agent.endpoint must use http or https, got '{}'", url.scheme());
        }
    }

    Ok(())
}
