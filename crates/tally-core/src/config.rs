//! Runtime configuration
//!
//! Built once by the caller and handed to each component at construction.
//!
//! ## Resolution
//!
//! 1. Compiled-in defaults
//! 2. TOML file (`--config` path, else `<config_dir>/tally/config.toml` when present)
//! 3. Environment overrides
//!
//! ```toml
//! [budget]
//! api_url = "https://api.ynab.com/v1"
//! token = "..."
//! default_months = 3
//!
//! [chat]
//! api_url = "https://api.anthropic.com"
//! api_key = "..."
//! model = "claude-sonnet-4-5"
//! max_tokens = 4096
//! max_iterations = 5
//!
//! [storage]
//! data_dir = "/home/me/.local/share/tally"
//! cache_ttl_hours = 24
//!
//! [http]
//! timeout_secs = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_BUDGET_API_URL: &str = "https://api.ynab.com/v1";
pub const DEFAULT_CHAT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_CHAT_MODEL: &str = "claude-sonnet-4-5";

/// Everything the library needs to talk to the outside world
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the budgeting API
    pub budget_api_url: String,
    /// Personal access token for the budgeting API
    pub budget_token: Option<String>,
    /// Base URL of the chat API (without `/v1/messages`)
    pub chat_api_url: String,
    pub chat_api_key: Option<String>,
    pub chat_model: String,
    pub max_tokens: u32,
    /// Tool-calling rounds per question before giving up
    pub max_iterations: usize,
    /// Where cache entries and persisted records live
    pub data_dir: PathBuf,
    pub cache_ttl: Duration,
    /// Months of history fetched when a command doesn't say
    pub default_months: u32,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budget_api_url: DEFAULT_BUDGET_API_URL.to_string(),
            budget_token: None,
            chat_api_url: DEFAULT_CHAT_API_URL.to_string(),
            chat_api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: 4096,
            max_iterations: 5,
            data_dir: default_data_dir(),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            default_months: 3,
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// `<data_local_dir>/tally`, or `./.tally` when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tally"))
        .unwrap_or_else(|| PathBuf::from(".tally"))
}

/// `<config_dir>/tally/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally").join("config.toml"))
}

impl Config {
    /// Resolve configuration from file and process environment
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults overlaid with a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&content)
    }

    /// Defaults overlaid with TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(budget) = raw.budget {
            if let Some(url) = budget.api_url {
                config.budget_api_url = url;
            }
            if budget.token.is_some() {
                config.budget_token = budget.token;
            }
            if let Some(months) = budget.default_months {
                config.default_months = months;
            }
        }

        if let Some(chat) = raw.chat {
            if let Some(url) = chat.api_url {
                config.chat_api_url = url;
            }
            if chat.api_key.is_some() {
                config.chat_api_key = chat.api_key;
            }
            if let Some(model) = chat.model {
                config.chat_model = model;
            }
            if let Some(max_tokens) = chat.max_tokens {
                config.max_tokens = max_tokens;
            }
            if let Some(iterations) = chat.max_iterations {
                config.max_iterations = iterations;
            }
        }

        if let Some(storage) = raw.storage {
            if let Some(dir) = storage.data_dir {
                config.data_dir = dir;
            }
            if let Some(hours) = storage.cache_ttl_hours {
                config.cache_ttl = Duration::from_secs(hours * 60 * 60);
            }
        }

        if let Some(http) = raw.http {
            if let Some(secs) = http.timeout_secs {
                config.http_timeout = Duration::from_secs(secs);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup("TALLY_BUDGET_TOKEN").or_else(|| lookup("YNAB_ACCESS_TOKEN")) {
            self.budget_token = Some(token);
        }
        if let Some(url) = lookup("TALLY_BUDGET_API_URL") {
            self.budget_api_url = url;
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.chat_api_key = Some(key);
        }
        if let Some(url) = lookup("TALLY_CHAT_API_URL") {
            self.chat_api_url = url;
        }
        if let Some(model) = lookup("TALLY_CHAT_MODEL") {
            self.chat_model = model;
        }
        if let Some(dir) = lookup("TALLY_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(hours) = lookup("TALLY_CACHE_TTL_HOURS") {
            let hours: u64 = hours.trim().parse().map_err(|_| {
                Error::Config(format!("TALLY_CACHE_TTL_HOURS must be a whole number: {}", hours))
            })?;
            self.cache_ttl = Duration::from_secs(hours * 60 * 60);
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".into()));
        }
        if self.default_months == 0 {
            return Err(Error::Config("default_months must be at least 1".into()));
        }
        Ok(())
    }

    /// Budgeting API token, or a configuration error naming how to set it
    pub fn require_budget_token(&self) -> Result<&str> {
        self.budget_token.as_deref().ok_or_else(|| {
            Error::Config(
                "No budgeting API token. Set TALLY_BUDGET_TOKEN or [budget] token in config.toml"
                    .into(),
            )
        })
    }

    /// Chat API key, or a configuration error naming how to set it
    pub fn require_chat_api_key(&self) -> Result<&str> {
        self.chat_api_key.as_deref().ok_or_else(|| {
            Error::Config(
                "No chat API key. Set ANTHROPIC_API_KEY or [chat] api_key in config.toml".into(),
            )
        })
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn user_context_path(&self) -> PathBuf {
        self.data_dir.join("user_context.json")
    }

    pub fn budget_selection_path(&self) -> PathBuf {
        self.data_dir.join("budget.json")
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    budget: Option<RawBudget>,
    chat: Option<RawChat>,
    storage: Option<RawStorage>,
    http: Option<RawHttp>,
}

#[derive(Debug, Deserialize)]
struct RawBudget {
    api_url: Option<String>,
    token: Option<String>,
    default_months: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    api_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    max_iterations: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    data_dir: Option<PathBuf>,
    cache_ttl_hours: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawHttp {
    timeout_secs: Option<u64>,
}
