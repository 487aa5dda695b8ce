//! Shared test helpers

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use shipit::app::config::DeploymentConfig;
use shipit::errors::DeployError;
use shipit::logs::RunLog;
use shipit::process::{CommandOutput, CommandRunner, CommandSpec};

pub const SERVER: &str = "203.0.113.10";
pub const SSH_USER: &str = "deploy";

/// A command as the runner received it
#[derive(Debug, Clone)]
pub struct Recorded {
    /// Unredacted program and arguments
    pub raw: String,
    /// Redacted rendering, as it would appear in logs
    pub shown: String,
    pub stdin: Option<String>,
}

/// Runner that records commands instead of executing them
///
/// Every command succeeds unless its raw command line contains one of the
/// configured failure needles.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Recorded>>,
    failures: Vec<(String, i32)>,
    clone_files: Vec<&'static str>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `status` for commands containing `needle`
    pub fn fail_when(mut self, needle: &str, status: i32) -> Self {
        self.failures.push((needle.to_string(), status));
        self
    }

    /// Make `git clone` create the target directory with these files
    pub fn with_clone_files(mut self, files: Vec<&'static str>) -> Self {
        self.clone_files = files;
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.raw.contains(needle)).count()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.count(needle) > 0
    }

    pub fn position(&self, needle: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.raw.contains(needle))
    }

    pub fn stdin_of(&self, needle: &str) -> Option<String> {
        self.calls()
            .into_iter()
            .find(|c| c.raw.contains(needle))
            .and_then(|c| c.stdin)
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        let raw = format!("{} {}", spec.program, spec.args.join(" "));
        self.calls.lock().unwrap().push(Recorded {
            raw: raw.clone(),
            shown: spec.to_string(),
            stdin: spec
                .stdin
                .as_ref()
                .map(|s| String::from_utf8_lossy(s).into_owned()),
        });

        let status = self
            .failures
            .iter()
            .find(|(needle, _)| raw.contains(needle.as_str()))
            .map(|(_, status)| *status)
            .unwrap_or(0);

        if status == 0 && spec.args.first().map(String::as_str) == Some("clone") {
            if let Some(dir) = spec.args.last() {
                std::fs::create_dir_all(dir).unwrap();
                for file in &self.clone_files {
                    std::fs::write(Path::new(dir).join(file), "").unwrap();
                }
            }
        }

        Ok(CommandOutput {
            status,
            stdout: String::new(),
            stderr: if status == 0 {
                String::new()
            } else {
                format!("simulated failure {}", status)
            },
        })
    }
}

pub fn test_config(app_port: u16) -> DeploymentConfig {
    DeploymentConfig {
        repo_url: "https://github.com/acme/shop.git".to_string(),
        branch: "main".to_string(),
        ssh_user: SSH_USER.to_string(),
        server_address: SERVER.to_string(),
        ssh_key_path: PathBuf::from("/keys/id_ed25519"),
        app_port,
        access_token: None,
    }
}

/// Create a working copy directory holding the given files
pub fn working_copy_with(root: &Path, files: &[&str]) -> PathBuf {
    let dir = root.join("shop");
    std::fs::create_dir_all(&dir).unwrap();
    for file in files {
        std::fs::write(dir.join(file), "").unwrap();
    }
    dir
}

pub fn test_log(root: &Path) -> RunLog {
    RunLog::create(root.join("logs")).unwrap()
}

/// The needle matching the reachability check
pub fn connection_check() -> String {
    format!("{}@{} true", SSH_USER, SERVER)
}
