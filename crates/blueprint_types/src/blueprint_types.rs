//! Blueprint Types - Data structures for the blueprint graph runtime
//!
//! Pure, serializable data shared by the runtime and the host: values that
//! flow along pins, the persisted graph format, node function metadata and
//! blueprint class records. No execution logic lives here.

mod class;
mod function;
mod graph;
mod value;

pub use class::*;
pub use function::*;
pub use graph::*;
pub use value::*;
