//! RelayBot configuration
//!
//! Loads configuration from `~/.config/relaybot/config.toml` (or an explicit
//! path), then applies environment overrides.

use relaybot_ai::SamplingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub completion: CompletionServiceConfig,
    #[serde(default)]
    pub image: ImageServiceConfig,
    #[serde(default)]
    pub directives: DirectiveConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub prompts: PromptConfig,
}

/// Completion service location and models
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub path: String,
    /// Conversational model
    pub model: String,
    /// Model used to fold participant logs into summaries
    pub summarizer_model: String,
    /// Model asked to verify generated images (defaults to `model`)
    pub verifier_model: Option<String>,
}

impl Default for CompletionServiceConfig {
    fn default() -> Self {
        Self {
            hostname: "192.168.216.84".to_string(),
            port: 11434,
            path: "/api/generate".to_string(),
            model: "Smooj".to_string(),
            summarizer_model: "llama3.2".to_string(),
            verifier_model: None,
        }
    }
}

impl CompletionServiceConfig {
    pub fn endpoint(&self) -> String {
        endpoint_url(&self.hostname, self.port, &self.path)
    }

    pub fn verifier_model(&self) -> &str {
        self.verifier_model.as_deref().unwrap_or(&self.model)
    }
}

/// Image synthesis service location and sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub path: String,
    pub sampling: SamplingParams,
}

impl Default for ImageServiceConfig {
    fn default() -> Self {
        Self {
            hostname: "192.168.216.84".to_string(),
            port: 7860,
            path: "/sdapi/v1/txt2img".to_string(),
            sampling: SamplingParams::default(),
        }
    }
}

impl ImageServiceConfig {
    pub fn endpoint(&self) -> String {
        endpoint_url(&self.hostname, self.port, &self.path)
    }
}

/// Literal markers the model uses to steer the reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectiveConfig {
    /// Reply prefix meaning "do not answer"
    pub decline_token: String,
    /// Separator between reply text and image prompt
    pub image_marker: String,
}

impl Default for DirectiveConfig {
    fn default() -> Self {
        Self {
            decline_token: "PASS".to_string(),
            image_marker: "image attached".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Unsummarized entries tolerated before a summary is produced
    pub summary_threshold: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            summary_threshold: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Total image attempts per reply (first try included)
    pub max_attempts: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Prepended to every conversational prompt
    pub system_prompt: String,
}

fn endpoint_url(hostname: &str, port: u16, path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    format!("http://{}:{}{}", hostname, port, path)
}

impl RelayConfig {
    /// Load configuration from default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields defaults; an unreadable or invalid file is
    /// reported and also yields defaults.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::read(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!("Ignoring config file {}: {:#}", path.display(), err);
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Get the default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("relaybot").join("config.toml"))
    }

    /// Apply process environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let completion = &mut self.completion;
        if let Some(value) = lookup("OLLAMA_HOSTNAME") {
            completion.hostname = value;
        }
        if let Some(port) = parse_port(&lookup, "OLLAMA_PORT") {
            completion.port = port;
        }
        if let Some(value) = lookup("OLLAMA_API_PATH") {
            completion.path = value;
        }
        if let Some(value) = lookup("OLLAMA_MODEL") {
            completion.model = value;
        }
        if let Some(value) = lookup("OLLAMA_SUMMARY_MODEL") {
            completion.summarizer_model = value;
        }

        let image = &mut self.image;
        if let Some(value) = lookup("SD_HOSTNAME") {
            image.hostname = value;
        }
        if let Some(port) = parse_port(&lookup, "SD_PORT") {
            image.port = port;
        }
        if let Some(value) = lookup("SD_API_PATH") {
            image.path = value;
        }

        if let Some(value) = lookup("SYSTEM_PROMPT") {
            self.prompts.system_prompt = value;
        }
    }
}

fn parse_port<F>(lookup: &F, key: &str) -> Option<u16>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a port number", key, raw);
            None
        }
    }
}
