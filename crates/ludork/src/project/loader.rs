//! Project Loader
//!
//! Loads project configuration from disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use super::config::*;

/// File name of the project manifest
pub const MANIFEST_FILE: &str = "project.toml";

/// Error type for project loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Project path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Project manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// A loaded project
#[derive(Debug, Clone)]
pub struct Project {
    pub path: PathBuf,
    pub manifest: ProjectManifest,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.manifest.project.name
    }

    pub fn actors(&self) -> &[ActorSpec] {
        &self.manifest.actors
    }
}

/// Project loader
pub struct ProjectLoader;

impl ProjectLoader {
    /// Load a project from the given path
    pub async fn load(path: impl AsRef<Path>) -> Result<Project, LoadError> {
        let path = path.as_ref();

        if !fs::try_exists(path).await? {
            return Err(LoadError::PathNotFound(path.to_path_buf()));
        }

        info!("Loading project from: {}", path.display());

        let manifest_path = path.join(MANIFEST_FILE);
        if !fs::try_exists(&manifest_path).await? {
            return Err(LoadError::ManifestNotFound(manifest_path));
        }

        let manifest_content = fs::read_to_string(&manifest_path).await?;
        let manifest: ProjectManifest = toml::from_str(&manifest_content)?;

        let mut seen = HashSet::new();
        for actor in &manifest.actors {
            if !seen.insert(actor.name.as_str()) {
                warn!(actor = %actor.name, "Duplicate actor name in manifest");
            }
        }

        info!(
            "Loaded project manifest: {} v{} ({} actors)",
            manifest.project.name,
            manifest.project.version,
            manifest.actors.len()
        );

        Ok(Project {
            path: path.to_path_buf(),
            manifest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"
[project]
name = "Sample"

[[actors]]
name = "hero"
class = "Data.Actors.BP_Hero"

[[actors]]
name = "crate"
class = "Engine.Gameplay.Actors.Actor"
"#,
        )
        .unwrap();

        let project = ProjectLoader::load(dir.path()).await.unwrap();
        assert_eq!(project.name(), "Sample");
        assert_eq!(project.manifest.project.version, "1.0.0");
        assert_eq!(project.actors().len(), 2);
        assert_eq!(
            project.actors()[0],
            ActorSpec {
                name: "hero".into(),
                class: "Data.Actors.BP_Hero".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_paths() {
        let dir = tempfile::tempdir().unwrap();

        let err = ProjectLoader::load(dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, LoadError::PathNotFound(_)));

        let err = ProjectLoader::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, LoadError::ManifestNotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[project\nname = 1").unwrap();

        let err = ProjectLoader::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, LoadError::TomlParseError(_)));
    }
}
