//! Deployment descriptor detection

use std::path::{Path, PathBuf};

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::logs::RunLog;

/// Compose descriptor names, in lookup order
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Single-container descriptor name
pub const DOCKERFILE: &str = "Dockerfile";

/// The descriptor that drives the deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// A multi-service compose file
    Compose(PathBuf),

    /// A single image built from a Dockerfile
    Dockerfile(PathBuf),
}

impl Descriptor {
    pub fn path(&self) -> &Path {
        match self {
            Descriptor::Compose(path) | Descriptor::Dockerfile(path) => path,
        }
    }

    /// Descriptor file name, relative to the working copy root
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Find the deployment descriptor at the working copy root
///
/// Compose files take precedence over a Dockerfile.
pub async fn find_descriptor(working_copy: &Dir) -> Option<Descriptor> {
    for name in COMPOSE_FILES {
        let file = working_copy.file(name);
        if file.exists().await {
            return Some(Descriptor::Compose(file.path().to_path_buf()));
        }
    }

    let dockerfile = working_copy.file(DOCKERFILE);
    if dockerfile.exists().await {
        return Some(Descriptor::Dockerfile(dockerfile.path().to_path_buf()));
    }

    None
}

/// Fail before any remote action when the working copy cannot be deployed
pub async fn validate_artifacts(working_copy: &Dir, log: &RunLog) -> Result<Descriptor, DeployError> {
    match find_descriptor(working_copy).await {
        Some(descriptor) => {
            log.info(format!("Found deployment descriptor {}", descriptor.file_name()));
            Ok(descriptor)
        }
        None => Err(DeployError::NoDeploymentDescriptor(
            working_copy.path().to_path_buf(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_compose_preferred_over_dockerfile() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Dockerfile"), "FROM scratch").unwrap();
        std::fs::write(tmp.path().join("compose.yaml"), "services: {}").unwrap();

        let found = find_descriptor(&Dir::new(tmp.path())).await.unwrap();
        assert_eq!(found, Descriptor::Compose(tmp.path().join("compose.yaml")));
    }

    #[tokio::test]
    async fn test_dockerfile_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Dockerfile"), "FROM scratch").unwrap();

        let found = find_descriptor(&Dir::new(tmp.path())).await.unwrap();
        assert_eq!(found.file_name(), "Dockerfile");
    }

    #[tokio::test]
    async fn test_directory_named_like_descriptor_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("docker-compose.yml")).unwrap();
        std::fs::write(tmp.path().join("README.md"), "# app").unwrap();

        assert!(find_descriptor(&Dir::new(tmp.path())).await.is_none());
    }
}
