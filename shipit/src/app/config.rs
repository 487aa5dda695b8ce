//! Deployment configuration resolution

use std::fmt;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::errors::DeployError;
use crate::logs::RunLog;
use crate::storage::settings::{expand_home, DeploymentDefaults};

/// Environment variable consulted for the access token
pub const ACCESS_TOKEN_ENV: &str = "SHIPIT_ACCESS_TOKEN";

/// Resolved, immutable configuration of one deployment run
#[derive(Debug)]
pub struct DeploymentConfig {
    pub repo_url: String,
    pub branch: String,
    pub ssh_user: String,
    pub server_address: String,
    pub ssh_key_path: PathBuf,
    pub app_port: u16,
    pub access_token: Option<SecretString>,
}

impl DeploymentConfig {
    /// Build a configuration made only of defaults, with no token
    pub fn from_defaults(defaults: &DeploymentDefaults) -> Self {
        Self {
            repo_url: defaults.repo_url.clone(),
            branch: defaults.branch.clone(),
            ssh_user: defaults.ssh_user.clone(),
            server_address: defaults.server_address.clone(),
            ssh_key_path: expand_home(&defaults.ssh_key_path),
            app_port: defaults.app_port,
            access_token: None,
        }
    }

    /// The externally reachable address of the deployed app
    pub fn public_url(&self) -> String {
        format!("http://{}", self.server_address)
    }

    /// Repository name, used to name the local working copy
    pub fn repo_name(&self) -> String {
        let trimmed = self.repo_url.trim_end_matches('/');
        let last = trimmed.rsplit(['/', ':']).next().unwrap_or_default();
        let name = last.strip_suffix(".git").unwrap_or(last);
        if name.is_empty() {
            "app".to_string()
        } else {
            name.to_string()
        }
    }

    /// One-line summary suitable for the run log; never contains secrets
    pub fn summary(&self) -> String {
        format!(
            "Configuration: repo={}, branch={}, ssh_user={}, server={}, ssh_key={}, app_port={}",
            mask_url_credentials(&self.repo_url),
            self.branch,
            self.ssh_user,
            self.server_address,
            self.ssh_key_path.display(),
            self.app_port
        )
    }
}

/// Hide any userinfo embedded in a URL
pub fn mask_url_credentials(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            // Setters only fail on host-less URLs, which carry no userinfo
            let _ = url.set_password(None);
            let _ = url.set_username("****");
            url.to_string()
        }
        _ => raw.to_string(),
    }
}

/// Fields collected from the operator, in prompt order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RepoUrl,
    AccessToken,
    Branch,
    SshUser,
    ServerAddress,
    SshKeyPath,
    AppPort,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::RepoUrl => "Repository URL",
            Field::AccessToken => "Access token",
            Field::Branch => "Branch",
            Field::SshUser => "SSH username",
            Field::ServerAddress => "Server address",
            Field::SshKeyPath => "SSH key path",
            Field::AppPort => "Application port",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Source of operator input
pub trait Prompter {
    /// Ask for a plain value; `None` means no answer was given
    fn text(&self, field: Field, default: &str) -> Result<Option<String>, DeployError>;

    /// Ask for a secret value without echoing it
    fn secret(&self, field: Field) -> Result<Option<SecretString>, DeployError>;
}

/// Prompter that never asks and always yields the defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsPrompter;

impl Prompter for DefaultsPrompter {
    fn text(&self, _field: Field, _default: &str) -> Result<Option<String>, DeployError> {
        Ok(None)
    }

    fn secret(&self, _field: Field) -> Result<Option<SecretString>, DeployError> {
        Ok(None)
    }
}

/// Pick the operator value when it is non-empty, the default otherwise
pub fn resolve_value(input: Option<String>, default: &str) -> String {
    match input {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Resolve the application port; an unparseable answer yields the default
/// together with the rejected text
pub fn resolve_port(input: Option<String>, default: u16) -> (u16, Option<String>) {
    let raw = resolve_value(input, &default.to_string());
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => (port, None),
        _ => (default, Some(raw)),
    }
}

fn ask(prompter: &dyn Prompter, field: Field, default: &str, log: &RunLog) -> Option<String> {
    match prompter.text(field, default) {
        Ok(answer) => answer,
        Err(e) => {
            log.warn(format!("Could not read {}: {}; using default", field, e));
            None
        }
    }
}

fn non_empty_secret(secret: Option<SecretString>) -> Option<SecretString> {
    secret.filter(|s| !s.expose_secret().trim().is_empty())
}

/// Merges operator answers with defaults
pub struct ConfigResolver<'a> {
    defaults: &'a DeploymentDefaults,
    env_token: Option<SecretString>,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(defaults: &'a DeploymentDefaults) -> Self {
        Self {
            defaults,
            env_token: None,
        }
    }

    /// Use a token supplied out of band when the operator gives none
    pub fn with_env_token(mut self, token: Option<SecretString>) -> Self {
        self.env_token = non_empty_secret(token);
        self
    }

    /// Resolve every field and log the configuration summary
    pub fn resolve(self, prompter: &dyn Prompter, log: &RunLog) -> DeploymentConfig {
        let ConfigResolver { defaults: d, env_token } = self;
        let mut config = DeploymentConfig::from_defaults(d);

        config.repo_url = resolve_value(ask(prompter, Field::RepoUrl, &d.repo_url, log), &d.repo_url);

        config.access_token = match prompter.secret(Field::AccessToken) {
            Ok(token) => non_empty_secret(token),
            Err(e) => {
                log.warn(format!("Could not read {}: {}", Field::AccessToken, e));
                None
            }
        }
        .or(env_token);

        config.branch = resolve_value(ask(prompter, Field::Branch, &d.branch, log), &d.branch);
        config.ssh_user = resolve_value(ask(prompter, Field::SshUser, &d.ssh_user, log), &d.ssh_user);
        config.server_address = resolve_value(
            ask(prompter, Field::ServerAddress, &d.server_address, log),
            &d.server_address,
        );
        config.ssh_key_path = expand_home(&resolve_value(
            ask(prompter, Field::SshKeyPath, &d.ssh_key_path, log),
            &d.ssh_key_path,
        ));

        let port_default = d.app_port.to_string();
        let (app_port, rejected) =
            resolve_port(ask(prompter, Field::AppPort, &port_default, log), d.app_port);
        if let Some(rejected) = rejected {
            log.warn(format!("Invalid application port '{}'; using {}", rejected, app_port));
        }
        config.app_port = app_port;

        log.info(config.summary());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_none_is_default() {
        assert_eq!(resolve_value(None, "main"), "main");
        assert_eq!(resolve_value(Some(String::new()), "main"), "main");
        assert_eq!(resolve_value(Some("   ".to_string()), "main"), "main");
        assert_eq!(resolve_value(Some(" dev ".to_string()), "main"), "dev");
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port(None, 3000), (3000, None));
        assert_eq!(resolve_port(Some("8080".to_string()), 3000), (8080, None));
        assert_eq!(
            resolve_port(Some("http".to_string()), 3000),
            (3000, Some("http".to_string()))
        );
        assert_eq!(
            resolve_port(Some("0".to_string()), 3000),
            (3000, Some("0".to_string()))
        );
    }

    #[test]
    fn test_repo_name() {
        let mut config = DeploymentConfig::from_defaults(&DeploymentDefaults::default());
        config.repo_url = "https://github.com/acme/web-shop.git".to_string();
        assert_eq!(config.repo_name(), "web-shop");

        config.repo_url = "git@github.com:acme/api".to_string();
        assert_eq!(config.repo_name(), "api");

        config.repo_url = "https://example.com/".to_string();
        assert_eq!(config.repo_name(), "example.com");
    }

    #[test]
    fn test_mask_url_credentials() {
        assert_eq!(
            mask_url_credentials("https://ghp_abc@github.com/acme/app.git"),
            "https://****@github.com/acme/app.git"
        );
        assert_eq!(
            mask_url_credentials("https://github.com/acme/app.git"),
            "https://github.com/acme/app.git"
        );
    }
}
