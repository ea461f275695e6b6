//! Error types for the graph runtime

use blueprint_types::{FunctionMetaError, ValueConversionError};
use thiserror::Error;

/// Result type alias using RuntimeError
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised while building, running or resuming graphs
#[derive(Debug, Error)]
pub enum RuntimeError {
    // ── configuration ───────────────────────────────────────────────────────
    #[error("Function '{function}' not found (owner class: {owner})")]
    FunctionNotFound { function: String, owner: String },

    #[error("Invalid function metadata: {0}")]
    InvalidFunction(#[from] FunctionMetaError),

    #[error("Function '{0}' is already registered")]
    DuplicateFunction(String),

    #[error("Graph key '{0}' not found")]
    UnknownKey(String),

    #[error("Start node for key '{0}' not set")]
    MissingStartNode(String),

    #[error("Start index {index} out of range for key '{key}' ({len} nodes)")]
    StartOutOfRange { key: String, index: usize, len: usize },

    #[error("Link in key '{key}' references node {node}, but the key has {len} nodes")]
    LinkOutOfRange { key: String, node: usize, len: usize },

    // ── evaluation ──────────────────────────────────────────────────────────
    #[error("Output pin {pin} out of range for node {node} in key '{key}' ({len} outputs)")]
    OutputPinOutOfRange {
        key: String,
        node: usize,
        pin: usize,
        len: usize,
    },

    #[error("Data dependency cycle through node {node} in key '{key}'")]
    DependencyCycle { key: String, node: usize },

    #[error("Node function '{function}' failed: {source}")]
    Node {
        function: String,
        #[source]
        source: NodeError,
    },

    // ── runaway control flow ────────────────────────────────────────────────
    #[error("Max steps {limit} exceeded while executing graph '{key}'")]
    StepLimitExceeded { key: String, limit: usize },

    // ── latent ──────────────────────────────────────────────────────────────
    #[error("Function '{0}' requested a wait but declares no latent outputs")]
    NotLatent(String),

    #[error("Node {node} of key '{key}' requested a wait while evaluated as a data dependency")]
    LatentInDataPath { key: String, node: usize },

    #[error("Node {node} of key '{key}' suspended, but its graph is not held in an arena")]
    DetachedGraph { key: String, node: usize },

    #[error("Resume target {node} no longer exists in key '{key}'")]
    InvalidResume { key: String, node: usize },

    // ── classes ─────────────────────────────────────────────────────────────
    #[error("Class {0} not found")]
    ClassNotFound(String),

    #[error("Class {0} appears in its own parent chain")]
    ClassCycle(String),

    #[error("Failed to read class record {path}: {source}")]
    ClassStoreIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse class record {path}: {source}")]
    ClassStoreParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RuntimeError {
    /// Errors caused by bad graph or class data rather than by running it
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RuntimeError::FunctionNotFound { .. }
                | RuntimeError::InvalidFunction(_)
                | RuntimeError::DuplicateFunction(_)
                | RuntimeError::UnknownKey(_)
                | RuntimeError::MissingStartNode(_)
                | RuntimeError::StartOutOfRange { .. }
                | RuntimeError::LinkOutOfRange { .. }
                | RuntimeError::NotLatent(_)
                | RuntimeError::ClassNotFound(_)
                | RuntimeError::ClassCycle(_)
        )
    }

    /// Errors raised while pulling data through the graph
    pub fn is_evaluation(&self) -> bool {
        matches!(
            self,
            RuntimeError::OutputPinOutOfRange { .. }
                | RuntimeError::DependencyCycle { .. }
                | RuntimeError::Node { .. }
                | RuntimeError::LatentInDataPath { .. }
        )
    }

    /// The control-flow step guard tripped
    pub fn is_runaway(&self) -> bool {
        matches!(self, RuntimeError::StepLimitExceeded { .. })
    }
}

/// Error raised by a node function body
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    #[error("Missing argument '{0}'")]
    MissingArgument(String),

    #[error("Argument '{name}': {source}")]
    Argument {
        name: String,
        #[source]
        source: ValueConversionError,
    },

    #[error("{0}")]
    Failed(String),
}

impl NodeError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(RuntimeError::UnknownKey("onTick".into()).is_configuration());
        assert!(RuntimeError::DependencyCycle {
            key: "onTick".into(),
            node: 2
        }
        .is_evaluation());

        let runaway = RuntimeError::StepLimitExceeded {
            key: "onTick".into(),
            limit: 10,
        };
        assert!(runaway.is_runaway());
        assert!(!runaway.is_configuration());
        assert_eq!(
            runaway.to_string(),
            "Max steps 10 exceeded while executing graph 'onTick'"
        );
    }
}
