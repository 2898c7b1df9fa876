//! Persistent configuration.
//!
//! Config file lives at `~/.config/sitecrew/config.toml`. Every value is
//! optional; `Resolved::merge` applies CLI flags > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::Provider;
use crate::roster::{AgentSpec, Preset};

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234";
pub const DEFAULT_MODEL: &str = "qwen3:8b";
pub const DEFAULT_COMFYUI_URL: &str = "http://127.0.0.1:8188";
pub const DEFAULT_PROJECTS_DIR: &str = "website_project";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelSection {
    pub provider: Option<Provider>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageSection {
    pub enabled: Option<bool>,
    pub comfyui_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandSection {
    pub enabled: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub allowed: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversationSection {
    pub max_exchanges: Option<usize>,
    pub max_active: Option<usize>,
    pub roster: Option<Preset>,
    pub crisis_threshold: Option<f64>,
    pub mediator_threshold: Option<u32>,
}

/// User configuration (persisted in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Directory holding one subdirectory per project.
    pub projects_dir: Option<PathBuf>,
    pub model: ModelSection,
    pub images: ImageSection,
    pub commands: CommandSection,
    pub conversation: ConversationSection,
    /// Replaces the built-in roster when non-empty.
    pub agents: Vec<AgentSpec>,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sitecrew")
        .join("config.toml")
}

impl Config {
    /// Load from `path`, or from the default location. A missing default
    /// file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Can't read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Bad config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// CLI-level overrides. `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<Provider>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub projects_dir: Option<PathBuf>,
    pub roster: Option<Preset>,
    pub no_images: bool,
    pub allow_commands: bool,
    pub debug: bool,
}

/// Effective settings after merging.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub model_timeout: Duration,

    pub images_enabled: bool,
    pub comfyui_url: String,
    pub image_timeout: Duration,
    pub image_width: u32,
    pub image_height: u32,
    pub image_steps: u32,

    pub commands_enabled: bool,
    pub command_timeout: Duration,
    pub allowed_commands: Vec<String>,

    pub max_exchanges: usize,
    pub max_active: usize,
    pub roster: Preset,
    pub crisis_threshold: f64,
    pub mediator_threshold: u32,
    pub agents: Vec<AgentSpec>,

    pub projects_dir: PathBuf,
    pub debug: bool,
}

fn default_allowed() -> Vec<String> {
    ["ls", "cat", "node", "npx", "python3", "tidy"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Resolved {
    /// Merge: CLI overrides > config file > defaults.
    pub fn merge(cli: &Overrides, config: &Config) -> Self {
        let m = &config.model;
        let i = &config.images;
        let c = &config.commands;
        let conv = &config.conversation;

        let provider = cli.provider.or(m.provider).unwrap_or(Provider::Openai);
        let base_url = cli
            .base_url
            .clone()
            .or_else(|| m.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = cli
            .model
            .clone()
            .or_else(|| m.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_key = cli.api_key.clone().or_else(|| m.api_key.clone());

        Self {
            provider,
            base_url,
            model,
            api_key,
            temperature: m.temperature.unwrap_or(0.7),
            max_tokens: m.max_tokens.unwrap_or(4096),
            model_timeout: Duration::from_secs(m.timeout_secs.unwrap_or(60)),

            images_enabled: !cli.no_images && i.enabled.unwrap_or(true),
            comfyui_url: i
                .comfyui_url
                .clone()
                .unwrap_or_else(|| DEFAULT_COMFYUI_URL.to_string()),
            image_timeout: Duration::from_secs(i.timeout_secs.unwrap_or(180)),
            image_width: i.width.unwrap_or(800),
            image_height: i.height.unwrap_or(600),
            image_steps: i.steps.unwrap_or(25),

            commands_enabled: cli.allow_commands || c.enabled.unwrap_or(false),
            command_timeout: Duration::from_secs(c.timeout_secs.unwrap_or(30)),
            allowed_commands: c.allowed.clone().unwrap_or_else(default_allowed),

            max_exchanges: conv.max_exchanges.unwrap_or(3).max(1),
            max_active: conv.max_active.unwrap_or(3).max(1),
            roster: cli.roster.or(conv.roster).unwrap_or_default(),
            crisis_threshold: conv.crisis_threshold.unwrap_or(0.3),
            mediator_threshold: conv.mediator_threshold.unwrap_or(2),
            agents: config.agents.clone(),

            projects_dir: cli
                .projects_dir
                .clone()
                .or_else(|| config.projects_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROJECTS_DIR)),
            debug: cli.debug,
        }
    }
}
