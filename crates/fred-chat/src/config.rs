//! Chat front-end configuration, loadable from TOML.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::Deserialize;

use fred_rules::{DEFAULT_INTRO_PROBABILITY, SelectorOptions};

/// How conversations reach the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// One conversation over stdin/stdout.
    #[default]
    Console,
    /// Line-oriented TCP server, one conversation per connection.
    Tcp,
}

/// Whether conversations share fire counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// One engine for every conversation.
    #[default]
    Shared,
    /// A fresh engine per conversation, cloned from the loaded rule base.
    PerSession,
}

/// Top-level configuration for `fred-chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Rule files, loaded in order into one rule base. Relative paths are
    /// resolved against the config file's directory.
    #[serde(default = "default_rule_files")]
    pub rule_files: Vec<PathBuf>,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// TCP listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Longer input lines are cut to this many bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

/// Selection and conversation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_intro_probability")]
    pub intro_probability: f64,
    #[serde(default)]
    pub session_mode: SessionMode,
    /// Fixed RNG seed. Unset means seeded from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Opening line when the rule base has no first action.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Reply used when selection fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

fn default_rule_files() -> Vec<PathBuf> {
    vec![PathBuf::from("rules/fred.txt")]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    6969
}

fn default_max_line_bytes() -> usize {
    1024
}

fn default_intro_probability() -> f64 {
    DEFAULT_INTRO_PROBABILITY
}

fn default_greeting() -> String {
    "Buenos nachos. How may I help you?".to_string()
}

fn default_fallback_reply() -> String {
    "What do you want to talk about?".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intro_probability: default_intro_probability(),
            session_mode: SessionMode::default(),
            seed: None,
            greeting: default_greeting(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

impl EngineConfig {
    pub fn selector_options(&self) -> SelectorOptions {
        SelectorOptions {
            intro_probability: self.intro_probability,
        }
    }
}

impl ChatConfig {
    /// Load config from a TOML file path, resolving rule files against the
    /// file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config = Self::from_toml(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;

        if let Some(dir) = path.parent() {
            config.resolve_rule_files(dir);
        }
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rule_files.is_empty() {
            bail!("rule_files must name at least one file");
        }
        let p = self.engine.intro_probability;
        if !(0.0..=1.0).contains(&p) {
            bail!("engine.intro_probability must be within [0, 1], got {p}");
        }
        if self.server.max_line_bytes == 0 {
            bail!("server.max_line_bytes must be positive");
        }
        Ok(())
    }

    fn resolve_rule_files(&mut self, dir: &Path) {
        for file in &mut self.rule_files {
            if file.is_relative() {
                *file = dir.join(&*file);
            }
        }
    }
}
