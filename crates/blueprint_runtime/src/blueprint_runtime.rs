//! Blueprint Runtime - Execution engine for blueprint node graphs
//!
//! Builds graphs from their persisted form, resolves node functions through
//! the owner's class and the shared function library, runs sub-graphs with
//! memoized data pulls and branch-routed control flow, and resumes latent
//! continuations once per host tick.

pub use blueprint_types;

mod class_registry;
mod context;
mod environment;
mod error;
mod expr;
mod graph;
mod latent;
mod library;
mod node;

pub use class_registry::*;
pub use context::*;
pub use environment::*;
pub use error::*;
pub use expr::*;
pub use graph::*;
pub use latent::*;
pub use library::*;
pub use node::*;
