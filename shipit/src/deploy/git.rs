//! Working copy synchronisation with the source repository

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::app::config::DeploymentConfig;
use crate::deploy::fsm::Stage;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::logs::RunLog;
use crate::process::{run_checked, CommandRunner, CommandSpec};

/// How the working copy was brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Cloned,
    Updated,
}

/// Build the transport URL carrying the token as its credential
///
/// Without a token the URL is returned unchanged.
pub fn authenticated_url(repo_url: &str, token: Option<&SecretString>) -> Result<String, DeployError> {
    let token = match token {
        Some(token) if !token.expose_secret().is_empty() => token,
        _ => return Ok(repo_url.to_string()),
    };

    let mut url = Url::parse(repo_url).map_err(|e| {
        DeployError::ConfigError(format!(
            "Cannot embed an access token in repository URL: {}",
            e
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DeployError::ConfigError(format!(
            "Access tokens need an http(s) repository URL, got {}",
            url.scheme()
        )));
    }
    url.set_username(token.expose_secret()).map_err(|_| {
        DeployError::ConfigError("Repository URL has no host to authenticate against".to_string())
    })?;
    Ok(url.to_string())
}

struct Git<'a> {
    token: Option<&'a SecretString>,
}

impl Git<'_> {
    fn command(&self) -> CommandSpec {
        let spec = CommandSpec::new("git").env("GIT_TERMINAL_PROMPT", "0");
        match self.token {
            Some(token) => spec.secret(token),
            None => spec,
        }
    }

    fn in_dir(&self, dir: &Dir) -> CommandSpec {
        self.command().arg("-C").arg(dir.path().display().to_string())
    }
}

/// Clone the repository, or update an existing working copy in place
///
/// An existing working copy is never re-cloned: origin is pointed at the
/// configured repository, then it is fetched, checked out and pulled,
/// converging on the remote branch tip. Local changes that
/// conflict with the pull are not preserved.
pub async fn sync_repository(
    runner: &dyn CommandRunner,
    config: &DeploymentConfig,
    working_copy: &Dir,
    log: &RunLog,
) -> Result<SyncOutcome, DeployError> {
    let token = config.access_token.as_ref();
    let git = Git { token };
    let auth_url = authenticated_url(&config.repo_url, token)?;
    let branch = config.branch.as_str();
    let stage = Stage::SourceSync;

    if !working_copy.exists().await {
        log.info(format!(
            "[{}] Cloning branch {} into {}",
            stage,
            branch,
            working_copy.path().display()
        ));
        let clone = git
            .command()
            .args(["clone", "--branch", branch])
            .arg(auth_url.as_str())
            .arg(working_copy.path().display().to_string());
        run_checked(runner, &clone, stage, "git clone", log).await?;
        scrub_credentials(runner, &git, config, working_copy, log).await?;
        log.info("Repository cloned");
        return Ok(SyncOutcome::Cloned);
    }

    log.info(format!(
        "[{}] Updating existing working copy at {}",
        stage,
        working_copy.path().display()
    ));

    let update = async {
        // The working copy may have been cloned from another repository
        // sharing the same name
        let set_url = git
            .in_dir(working_copy)
            .args(["remote", "set-url", "origin"])
            .arg(auth_url.as_str());
        run_checked(runner, &set_url, stage, "git remote set-url", log).await?;
        let fetch = git.in_dir(working_copy).args(["fetch", "origin", branch]);
        run_checked(runner, &fetch, stage, "git fetch", log).await?;
        let checkout = git.in_dir(working_copy).args(["checkout", branch]);
        run_checked(runner, &checkout, stage, "git checkout", log).await?;
        let pull = git.in_dir(working_copy).args(["pull", "origin", branch]);
        run_checked(runner, &pull, stage, "git pull", log).await?;
        Ok::<(), DeployError>(())
    }
    .await;

    let scrubbed = scrub_credentials(runner, &git, config, working_copy, log).await;
    update?;
    scrubbed?;

    log.info("Repository updated");
    Ok(SyncOutcome::Updated)
}

/// Point origin back at the plain URL so the token is not left in
/// `.git/config`, where the transfer would copy it to the host
async fn scrub_credentials(
    runner: &dyn CommandRunner,
    git: &Git<'_>,
    config: &DeploymentConfig,
    working_copy: &Dir,
    log: &RunLog,
) -> Result<(), DeployError> {
    if git.token.is_none() {
        return Ok(());
    }
    let reset = git
        .in_dir(working_copy)
        .args(["remote", "set-url", "origin"])
        .arg(config.repo_url.as_str());
    run_checked(runner, &reset, Stage::SourceSync, "git remote set-url", log).await?;
    Ok(())
}
