//! Ludork - Headless game runtime for blueprint actors
//!
//! This crate provides the host side of the blueprint runtime:
//! - Built-in node functions and the native actor base class
//! - A `World` that spawns actors, ticks them and resumes latent nodes
//! - Project loading and layered engine configuration

// Re-export core crates
pub use blueprint_runtime;

// Actor state and the native base class
pub mod actor;

// Engine configuration
pub mod config;

// Built-in nodes and world lifecycle
pub mod engine;

// Project management
pub mod project;
