//! Project Configuration Types
//!
//! Defines the structure of project files on disk.

use serde::{Deserialize, Serialize};

/// Project manifest (project.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub project: ProjectInfo,
    /// Actors spawned when the project starts, in order
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
}

/// Project information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub description: Option<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// An actor to spawn (`[[actors]]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSpec {
    pub name: String,
    /// Dotted class path, e.g. `Data.Actors.BP_Hero`
    pub class: String,
}
