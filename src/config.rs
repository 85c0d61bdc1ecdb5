//! Configuration for flowboard.
//!
//! Settings are layered: `flowboard.toml` first, then environment variables
//! (`FLOWBOARD_BASE_URL`, `FLOWBOARD_TOKEN`, also read from `.env`), then CLI
//! flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! base_url = "https://tickets.example.com"
//! timeout_secs = 30
//!
//! [board]
//! page_size = 100
//! click_threshold_ms = 200
//! default_project = "WEB"
//! ```
//!
//! The access token is never read from the file.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::board::api::SessionContext;
use crate::board::session::SessionOptions;

pub const CONFIG_FILE_NAME: &str = "flowboard.toml";
pub const ENV_BASE_URL: &str = "FLOWBOARD_BASE_URL";
pub const ENV_TOKEN: &str = "FLOWBOARD_TOKEN";

/// Connection settings for the project-management server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Server root, e.g. `https://tickets.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSection {
    /// Tickets requested per search page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Presses shorter than this open the ticket instead of dragging it
    #[serde(default = "default_click_threshold_ms")]
    pub click_threshold_ms: u64,
    /// Project used when a command is given none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,
}

fn default_page_size() -> u32 {
    100
}

fn default_click_threshold_ms() -> u64 {
    200
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            click_threshold_ms: default_click_threshold_ms(),
            default_project: None,
        }
    }
}

/// The complete flowboard.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlowboardToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub board: BoardSection,
}

impl FlowboardToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse flowboard.toml")
    }

    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            toml::to_string_pretty(self).context("Failed to serialize flowboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        match &self.server.base_url {
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                warnings.push(format!(
                    "Invalid base_url '{}': should start with http:// or https://",
                    url
                ));
            }
            _ => {}
        }
        if self.server.timeout_secs == 0 {
            warnings.push("timeout_secs is 0: every request would time out".to_string());
        }
        if self.board.page_size == 0 {
            warnings.push("page_size is 0: a page size of 1 will be used".to_string());
        }
        if self.board.click_threshold_ms > 2_000 {
            warnings.push(format!(
                "click_threshold_ms {} is unusually long: slow drags will open tickets",
                self.board.click_threshold_ms
            ));
        }

        warnings
    }
}

/// Where the configuration lives when no `--config` is given: `./flowboard.toml`
/// if present, else the user config directory.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("flowboard").join(CONFIG_FILE_NAME))
        .unwrap_or(local)
}

/// Resolved configuration: file, environment and CLI overrides merged.
#[derive(Debug, Clone)]
pub struct FlowboardConfig {
    pub config_path: PathBuf,
    pub toml: FlowboardToml,
    env_base_url: Option<String>,
    env_token: Option<String>,
    /// CLI override: server root
    pub cli_base_url: Option<String>,
    /// CLI override: access token
    pub cli_token: Option<String>,
}

impl FlowboardConfig {
    /// Load from `path` (or the default location) and the process environment.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(
        path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let config_path = path.unwrap_or_else(default_config_path);
        let toml = FlowboardToml::load_or_default(&config_path)?;
        tracing::debug!(path = %config_path.display(), "configuration loaded");
        Ok(Self {
            config_path,
            toml,
            env_base_url: env(ENV_BASE_URL).filter(|v| !v.is_empty()),
            env_token: env(ENV_TOKEN).filter(|v| !v.is_empty()),
            cli_base_url: None,
            cli_token: None,
        })
    }

    pub fn with_cli_args(mut self, base_url: Option<String>, token: Option<String>) -> Self {
        self.cli_base_url = base_url;
        self.cli_token = token;
        self
    }

    /// Server root (CLI → env → file).
    pub fn base_url(&self) -> Option<String> {
        self.cli_base_url
            .clone()
            .or_else(|| self.env_base_url.clone())
            .or_else(|| self.toml.server.base_url.clone())
    }

    /// Access token (CLI → env).
    pub fn access_token(&self) -> Option<String> {
        self.cli_token.clone().or_else(|| self.env_token.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.toml.server.timeout_secs.max(1))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            page_size: self.toml.board.page_size.max(1),
            click_threshold: Duration::from_millis(self.toml.board.click_threshold_ms),
        }
    }

    pub fn session_context(&self) -> Result<SessionContext> {
        let base_url = self.base_url().ok_or_else(|| {
            anyhow!(
                "No server configured. Set base_url in {}, {} or pass --base-url",
                self.config_path.display(),
                ENV_BASE_URL
            )
        })?;
        Ok(SessionContext::new(base_url, self.access_token()))
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if self.base_url().is_none() {
            warnings.push(format!(
                "No base_url configured (file, {} or --base-url)",
                ENV_BASE_URL
            ));
        }
        if self.access_token().is_none() {
            warnings.push(format!(
                "No access token: set {} or pass --token",
                ENV_TOKEN
            ));
        }
        warnings
    }
}
