//! Project Management
//!
//! Loads the project manifest that names the actors to spawn.

mod config;
mod loader;

pub use config::*;
pub use loader::*;
