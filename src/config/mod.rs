use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::llm::{ChatOptions, DEFAULT_MAX_ROUNDS};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const PROJECT_CONFIG_DIR: &str = ".susi";

/// Appended to every system prompt so the model edits files through diffs.
pub const TOOLING_GUIDANCE: &str = "Tooling policy: use vfs_apply_diff for edits to existing files. \
Use vfs_write_file only to create new files or when explicitly asked to overwrite completely.";

/// HTTP timeouts. Unset means no limit.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LlmConfig {
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

impl LlmConfig {
    fn or(self, lower: LlmConfig) -> LlmConfig {
        LlmConfig {
            connect_timeout_ms: self.connect_timeout_ms.or(lower.connect_timeout_ms),
            request_timeout_ms: self.request_timeout_ms.or(lower.request_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Empty until configured; chat commands refuse to run without one.
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub stop_tokens: Vec<String>,
    pub stream: bool,
    pub max_rounds: usize,
    /// Directory backing the file store. `None` selects the in-memory store.
    pub store_root: Option<PathBuf>,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_layer(FileConfig::default())
    }
}

/// One configuration layer: a toml file, the environment, or the command
/// line. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub stop_tokens: Option<Vec<String>>,
    pub stream: Option<bool>,
    pub max_rounds: Option<usize>,
    pub store_root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub llm: Option<LlmConfig>,
}

// blank strings count as unset
fn pick(upper: Option<String>, lower: Option<String>) -> Option<String> {
    upper
        .filter(|s| !s.trim().is_empty())
        .or(lower.filter(|s| !s.trim().is_empty()))
}

impl FileConfig {
    /// Keeps every field set in `self` and fills the rest from `lower`.
    pub fn or(self, lower: FileConfig) -> FileConfig {
        FileConfig {
            base_url: pick(self.base_url, lower.base_url),
            api_key: pick(self.api_key, lower.api_key),
            model: pick(self.model, lower.model),
            system_prompt: self.system_prompt.or(lower.system_prompt),
            max_tokens: self.max_tokens.or(lower.max_tokens),
            temperature: self.temperature.or(lower.temperature),
            stop_tokens: self.stop_tokens.or(lower.stop_tokens),
            stream: self.stream.or(lower.stream),
            max_rounds: self.max_rounds.or(lower.max_rounds),
            store_root: self.store_root.or(lower.store_root),
            log_level: pick(self.log_level, lower.log_level),
            log_file: self.log_file.or(lower.log_file),
            llm: match (self.llm, lower.llm) {
                (Some(a), Some(b)) => Some(a.or(b)),
                (a, b) => a.or(b),
            },
        }
    }

    /// The `SUSI_*` environment variables as a layer.
    pub fn from_env_with(get: impl Fn(&str) -> Option<String>) -> FileConfig {
        FileConfig {
            base_url: get("SUSI_BASE_URL"),
            api_key: get("SUSI_API_KEY"),
            model: get("SUSI_MODEL"),
            log_level: get("SUSI_LOG"),
            ..Default::default()
        }
    }
}

impl AppConfig {
    /// Applies defaults to a fully merged layer.
    pub fn from_layer(layer: FileConfig) -> Self {
        Self {
            base_url: layer
                .base_url
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: layer.api_key,
            model: layer.model.map(|s| s.trim().to_string()).unwrap_or_default(),
            system_prompt: layer.system_prompt.unwrap_or_default(),
            max_tokens: layer.max_tokens,
            temperature: layer.temperature,
            stop_tokens: layer.stop_tokens.unwrap_or_default(),
            stream: layer.stream.unwrap_or(false),
            max_rounds: layer.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS).max(1),
            store_root: layer.store_root,
            log_level: layer
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_file: layer.log_file,
            llm: layer.llm.unwrap_or_default(),
        }
    }

    /// Resolves command line, environment, project file and global file, in
    /// that order of precedence.
    pub fn load(cli_layer: FileConfig) -> Result<Self> {
        let project_root = env::current_dir().context("resolve current dir")?;
        let project_cfg = load_project_config(&project_root).unwrap_or_default();
        let file_cfg = load_file_config().unwrap_or_default();
        let env_cfg = FileConfig::from_env_with(|k| env::var(k).ok());
        Ok(Self::from_layer(
            cli_layer.or(env_cfg).or(project_cfg).or(file_cfg),
        ))
    }

    pub fn effective_system_prompt(&self) -> String {
        let prompt = self.system_prompt.trim();
        if prompt.is_empty() {
            TOOLING_GUIDANCE.to_string()
        } else {
            format!("{prompt}\n\n{TOOLING_GUIDANCE}")
        }
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop_tokens: self.stop_tokens.clone(),
            stream: Some(self.stream),
            ..Default::default()
        }
    }
}

/// Parses one config file. A file that does not parse is logged and
/// skipped.
pub fn read_config_file(path: &Path) -> Result<Option<FileConfig>> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    match toml::from_str::<FileConfig>(&s) {
        Ok(cfg) => {
            info!(path=%path.display(), "loaded config file");
            Ok(Some(cfg))
        }
        Err(e) => {
            warn!(path=%path.display(), error=%e.to_string(), "parse config failed");
            Ok(None)
        }
    }
}

fn global_config_candidates() -> Vec<PathBuf> {
    let mut v = Vec::new();
    if let Ok(p) = env::var("SUSI_CONFIG") {
        v.push(PathBuf::from(p));
    }
    if let Some(dir) = dirs::config_dir() {
        v.push(dir.join("susi").join("config.toml"));
    }
    v
}

pub fn load_file_config() -> Result<FileConfig> {
    for p in global_config_candidates() {
        if p.exists()
            && let Some(cfg) = read_config_file(&p)?
        {
            return Ok(cfg);
        }
    }
    Ok(FileConfig::default())
}

/// Load project-specific configuration from .susi/config.toml
pub fn load_project_config(project_root: &Path) -> Result<FileConfig> {
    let path = project_root.join(PROJECT_CONFIG_DIR).join("config.toml");
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    Ok(read_config_file(&path)?.unwrap_or_default())
}

#[cfg(test)]
mod tests;
