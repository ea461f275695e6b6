// Function Library - The shared module of free node functions
//
// Nodes whose function token is not `self.`-prefixed (and not a member of the
// owner class) resolve here. Each entry pairs the function's metadata with
// its implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use blueprint_types::{FunctionMeta, Outputs};

use crate::context::CallContext;
use crate::error::{NodeError, Result, RuntimeError};

// ─────────────────────────────────────────────────────────────────────────────
// Node Function Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A callable that a graph node invokes
pub trait NodeFunction: Send + Sync {
    fn call(&self, ctx: &mut CallContext<'_>) -> std::result::Result<Outputs, NodeError>;
}

/// Closure-based node function
pub struct FnNodeFunction<F>
where
    F: Fn(&mut CallContext<'_>) -> std::result::Result<Outputs, NodeError> + Send + Sync,
{
    func: F,
}

impl<F> FnNodeFunction<F>
where
    F: Fn(&mut CallContext<'_>) -> std::result::Result<Outputs, NodeError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> NodeFunction for FnNodeFunction<F>
where
    F: Fn(&mut CallContext<'_>) -> std::result::Result<Outputs, NodeError> + Send + Sync,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> std::result::Result<Outputs, NodeError> {
        (self.func)(ctx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Function Entry
// ─────────────────────────────────────────────────────────────────────────────

/// Validated metadata plus implementation; cheap to clone
#[derive(Clone)]
pub struct FunctionEntry {
    meta: Arc<FunctionMeta>,
    function: Arc<dyn NodeFunction>,
}

impl FunctionEntry {
    pub fn new(meta: FunctionMeta, function: Arc<dyn NodeFunction>) -> Result<Self> {
        meta.validate()?;
        Ok(Self {
            meta: Arc::new(meta),
            function,
        })
    }

    pub fn from_fn<F>(meta: FunctionMeta, func: F) -> Result<Self>
    where
        F: Fn(&mut CallContext<'_>) -> std::result::Result<Outputs, NodeError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(meta, Arc::new(FnNodeFunction::new(func)))
    }

    pub fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    pub fn function(&self) -> &Arc<dyn NodeFunction> {
        &self.function
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

impl fmt::Debug for FunctionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEntry")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Function Library
// ─────────────────────────────────────────────────────────────────────────────

/// Flat, read-only-at-runtime registry of free node functions
#[derive(Default)]
pub struct FunctionLibrary {
    functions: HashMap<String, FunctionEntry>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `meta.name`
    pub fn register(&mut self, meta: FunctionMeta, function: Arc<dyn NodeFunction>) -> Result<()> {
        self.insert(FunctionEntry::new(meta, function)?)
    }

    /// Register a closure under `meta.name`
    pub fn register_fn<F>(&mut self, meta: FunctionMeta, func: F) -> Result<()>
    where
        F: Fn(&mut CallContext<'_>) -> std::result::Result<Outputs, NodeError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(FunctionEntry::from_fn(meta, func)?)
    }

    fn insert(&mut self, entry: FunctionEntry) -> Result<()> {
        let name = entry.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(RuntimeError::DuplicateFunction(name));
        }
        self.functions.insert(name, entry);
        Ok(())
    }

    /// Look up a function by path
    ///
    /// A module-qualified path (`Math.Lerp`) that is not registered verbatim
    /// falls back to its last segment.
    pub fn get(&self, path: &str) -> Option<&FunctionEntry> {
        let path = path.trim();
        self.functions.get(path).or_else(|| {
            path.rsplit_once('.')
                .and_then(|(_, name)| self.functions.get(name.trim()))
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn metas(&self) -> impl Iterator<Item = &FunctionMeta> {
        self.functions.values().map(FunctionEntry::meta)
    }

    pub fn in_category(&self, category: &str) -> Vec<&FunctionMeta> {
        self.metas().filter(|m| m.category == category).collect()
    }

    /// Sorted, de-duplicated category names
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self.metas().map(|m| m.category.clone()).collect();
        cats.sort();
        cats.dedup();
        cats
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_types::{ParamType, Value};

    fn noop(_ctx: &mut CallContext<'_>) -> std::result::Result<Outputs, NodeError> {
        Ok(Outputs::none())
    }

    #[test]
    fn test_empty_library() {
        let library = FunctionLibrary::new();
        assert!(library.is_empty());
        assert!(library.get("Print").is_none());
    }

    #[test]
    fn test_register_and_qualified_lookup() {
        let mut library = FunctionLibrary::new();
        library
            .register_fn(
                FunctionMeta::new("Lerp")
                    .category("Math")
                    .param("a", ParamType::Float)
                    .param("b", ParamType::Float)
                    .param("t", ParamType::Float),
                noop,
            )
            .unwrap();

        assert!(library.contains("Lerp"));
        assert!(library.contains("NF_Math.Lerp"));
        assert_eq!(library.get("Lerp").unwrap().meta().params.len(), 3);
        assert_eq!(library.categories(), vec!["Math".to_string()]);
    }

    #[test]
    fn test_duplicate_and_invalid_registrations() {
        let mut library = FunctionLibrary::new();
        library.register_fn(FunctionMeta::new("Print"), noop).unwrap();
        assert!(matches!(
            library.register_fn(FunctionMeta::new("Print"), noop),
            Err(RuntimeError::DuplicateFunction(_))
        ));

        let bad = FunctionMeta::new("Pick").branch("A", vec![Value::Float(0.5)]);
        assert!(matches!(
            library.register_fn(bad, noop),
            Err(RuntimeError::InvalidFunction(_))
        ));
    }
}
