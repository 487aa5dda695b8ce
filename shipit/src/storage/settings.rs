//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::{LogLevel, DEFAULT_LOG_RETENTION};

/// Operator settings, read from `settings.json` when present
///
/// Has no access token field: credentials are never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Number of run logs to keep
    #[serde(default = "default_log_retention")]
    pub log_retention: usize,

    /// Defaults offered at the prompts
    #[serde(default)]
    pub defaults: DeploymentDefaults,
}

fn default_log_retention() -> usize {
    DEFAULT_LOG_RETENTION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_retention: DEFAULT_LOG_RETENTION,
            defaults: DeploymentDefaults::default(),
        }
    }
}

impl Settings {
    /// Load settings; a missing file yields the compiled defaults
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        file.read_json::<Settings>().await
    }
}

/// Default values for every non-secret deployment field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDefaults {
    #[serde(default = "default_repo_url")]
    pub repo_url: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    #[serde(default = "default_server_address")]
    pub server_address: String,

    #[serde(default = "default_ssh_key_path")]
    pub ssh_key_path: String,

    #[serde(default = "default_app_port")]
    pub app_port: u16,
}

fn default_repo_url() -> String {
    "https://github.com/example/app.git".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_ssh_user() -> String {
    "ubuntu".to_string()
}

fn default_server_address() -> String {
    "127.0.0.1".to_string()
}

fn default_ssh_key_path() -> String {
    "~/.ssh/id_rsa".to_string()
}

fn default_app_port() -> u16 {
    3000
}

impl Default for DeploymentDefaults {
    fn default() -> Self {
        Self {
            repo_url: default_repo_url(),
            branch: default_branch(),
            ssh_user: default_ssh_user(),
            server_address: default_server_address(),
            ssh_key_path: default_ssh_key_path(),
            app_port: default_app_port(),
        }
    }
}

/// Expand a leading `~` against the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
