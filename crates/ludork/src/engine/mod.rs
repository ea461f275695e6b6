//! Blueprint Engine
//!
//! Built-in node functions and the world that drives actor graphs.

mod nodes;
mod world;

pub use nodes::{register_builtin_nodes, truthy};
pub use world::*;
