// Class Registry - Resolves dotted class paths to behaviors
//
// A path resolves to a native class registered by the host, or else to a
// blueprint class synthesized from a stored record (parent path + attrs +
// graph). A synthesized class is composition, not a new type: its behavior
// holds the resolved parent plus its own override tables, and lookups walk
// the chain upward.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use blueprint_types::{ClassRecord, FunctionMeta, GraphData, Outputs, Value};

use crate::context::CallContext;
use crate::error::{NodeError, Result, RuntimeError};
use crate::library::FunctionEntry;

// ─────────────────────────────────────────────────────────────────────────────
// Record Stores
// ─────────────────────────────────────────────────────────────────────────────

/// Path-addressable source of serialized class records
pub trait ClassRecordStore: Send + Sync {
    /// `Ok(None)` when the store has no record for `path`
    fn load(&self, path: &str) -> Result<Option<ClassRecord>>;
}

/// In-memory record store
#[derive(Debug, Default)]
pub struct MemoryClassStore {
    records: HashMap<String, ClassRecord>,
}

impl MemoryClassStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, record: ClassRecord) {
        self.records.insert(path.into(), record);
    }

    pub fn with(mut self, path: impl Into<String>, record: ClassRecord) -> Self {
        self.insert(path, record);
        self
    }
}

impl ClassRecordStore for MemoryClassStore {
    fn load(&self, path: &str) -> Result<Option<ClassRecord>> {
        Ok(self.records.get(path).cloned())
    }
}

/// Records stored as JSON files, `a.b.C` -> `<root>/a/b/C.json`
#[derive(Debug, Clone)]
pub struct DirectoryClassStore {
    root: PathBuf,
}

impl DirectoryClassStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the record for `path`; `None` for malformed paths
    pub fn record_path(&self, path: &str) -> Option<PathBuf> {
        let mut file = self.root.clone();
        for segment in path.split('.') {
            if segment.is_empty() || segment.contains(['/', '\\']) {
                return None;
            }
            file.push(segment);
        }
        file.set_extension("json");
        Some(file)
    }
}

impl ClassRecordStore for DirectoryClassStore {
    fn load(&self, path: &str) -> Result<Option<ClassRecord>> {
        let Some(file) = self.record_path(path) else {
            return Ok(None);
        };
        if !file.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&file).map_err(|source| RuntimeError::ClassStoreIo {
            path: file.display().to_string(),
            source,
        })?;
        let record = ClassRecord::from_json(&content).map_err(|source| {
            RuntimeError::ClassStoreParse {
                path: file.display().to_string(),
                source,
            }
        })?;

        tracing::debug!(class = %path, file = %file.display(), "Loaded class record");
        Ok(Some(record))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Native Classes
// ─────────────────────────────────────────────────────────────────────────────

/// A class implemented by the host
#[derive(Debug, Clone)]
pub struct NativeClass {
    pub path: String,
    pub parent: Option<String>,
    pub attrs: BTreeMap<String, Value>,
    pub functions: HashMap<String, FunctionEntry>,
}

impl NativeClass {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            parent: None,
            attrs: BTreeMap::new(),
            functions: HashMap::new(),
        }
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    /// Add a member function, keyed by its metadata name
    pub fn function(mut self, entry: FunctionEntry) -> Self {
        self.functions.insert(entry.name().to_string(), entry);
        self
    }

    /// Add a closure member function
    pub fn function_fn<F>(self, meta: FunctionMeta, func: F) -> Result<Self>
    where
        F: Fn(&mut CallContext<'_>) -> std::result::Result<Outputs, NodeError>
            + Send
            + Sync
            + 'static,
    {
        Ok(self.function(FunctionEntry::from_fn(meta, func)?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved Behavior
// ─────────────────────────────────────────────────────────────────────────────

/// Where a resolved class came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassOrigin {
    Native,
    Synthesized,
}

/// A resolved class: own tables plus the resolved parent
#[derive(Debug)]
pub struct ResolvedBehavior {
    path: String,
    parent: Option<Arc<ResolvedBehavior>>,
    attrs: BTreeMap<String, Value>,
    functions: HashMap<String, FunctionEntry>,
    graph: Option<GraphData>,
    origin: ClassOrigin,
}

impl ResolvedBehavior {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<&Arc<ResolvedBehavior>> {
        self.parent.as_ref()
    }

    pub fn origin(&self) -> ClassOrigin {
        self.origin
    }

    pub fn is_synthesized(&self) -> bool {
        self.origin == ClassOrigin::Synthesized
    }

    /// Parent, grandparent, ... up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = &ResolvedBehavior> {
        std::iter::successors(self.parent.as_deref(), |class| class.parent.as_deref())
    }

    pub fn is_a(&self, path: &str) -> bool {
        self.path == path || self.ancestors().any(|class| class.path == path)
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.attr(name)))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.function(name)))
    }

    /// All attributes, children overriding ancestors
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        let mut merged = self
            .parent
            .as_ref()
            .map(|p| p.attributes())
            .unwrap_or_default();
        merged.extend(self.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Own graph, else the nearest ancestor's
    pub fn graph(&self) -> Option<&GraphData> {
        self.graph
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.graph()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Path -> behavior resolution with a process-lifetime cache
pub struct ClassRegistry {
    natives: HashMap<String, NativeClass>,
    store: Box<dyn ClassRecordStore>,
    cache: DashMap<String, Arc<ResolvedBehavior>>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new(MemoryClassStore::new())
    }
}

impl ClassRegistry {
    pub fn new(store: impl ClassRecordStore + 'static) -> Self {
        Self {
            natives: HashMap::new(),
            store: Box::new(store),
            cache: DashMap::new(),
        }
    }

    /// Register a host class; cached resolutions of it and of every class
    /// deriving from it are dropped
    pub fn register_native(&mut self, class: NativeClass) {
        tracing::debug!(class = %class.path, "Registered native class");
        self.invalidate(&class.path);
        self.natives.insert(class.path.clone(), class);
    }

    /// Resolve a class path, resolving its parents first
    pub fn resolve(&self, path: &str) -> Result<Arc<ResolvedBehavior>> {
        let mut resolving = Vec::new();
        self.resolve_inner(path.trim(), &mut resolving)
    }

    fn resolve_inner(&self, path: &str, resolving: &mut Vec<String>) -> Result<Arc<ResolvedBehavior>> {
        if let Some(hit) = self.cache.get(path) {
            return Ok(Arc::clone(hit.value()));
        }
        if resolving.iter().any(|p| p == path) {
            return Err(RuntimeError::ClassCycle(path.to_string()));
        }
        resolving.push(path.to_string());

        let behavior = match self.natives.get(path) {
            Some(native) => {
                let parent = match &native.parent {
                    Some(parent) => Some(self.resolve_inner(parent, resolving)?),
                    None => None,
                };
                ResolvedBehavior {
                    path: path.to_string(),
                    parent,
                    attrs: native.attrs.clone(),
                    functions: native.functions.clone(),
                    graph: None,
                    origin: ClassOrigin::Native,
                }
            }
            None => {
                let record = self
                    .store
                    .load(path)?
                    .ok_or_else(|| RuntimeError::ClassNotFound(path.to_string()))?;
                let parent = match record.parent.trim() {
                    "" => None,
                    parent => Some(self.resolve_inner(parent, resolving)?),
                };
                tracing::info!(
                    class = %path,
                    parent = %record.parent,
                    attrs = record.attrs.len(),
                    "Synthesized blueprint class"
                );
                ResolvedBehavior {
                    path: path.to_string(),
                    parent,
                    attrs: record.attrs,
                    functions: HashMap::new(),
                    graph: record.graph,
                    origin: ClassOrigin::Synthesized,
                }
            }
        };

        resolving.pop();
        let entry = self
            .cache
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(behavior));
        Ok(Arc::clone(entry.value()))
    }

    /// Whether `path` names a native class or a stored record
    pub fn contains(&self, path: &str) -> bool {
        self.cache.contains_key(path)
            || self.natives.contains_key(path)
            || matches!(self.store.load(path), Ok(Some(_)))
    }

    /// Raw stored record for a path
    pub fn get_record(&self, path: &str) -> Result<Option<ClassRecord>> {
        self.store.load(path)
    }

    /// Whether the cached resolution of `path` was synthesized from a record
    pub fn is_synthesized(&self, path: &str) -> bool {
        self.cache
            .get(path)
            .map(|hit| hit.is_synthesized())
            .unwrap_or(false)
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.cache.contains_key(path)
    }

    /// Drop a cached resolution and those of its descendants (e.g. after
    /// the record changed on disk)
    pub fn invalidate(&self, path: &str) {
        self.cache.retain(|_, class| !class.is_a(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_types::ParamType;

    fn registry() -> ClassRegistry {
        let store = MemoryClassStore::new()
            .with(
                "Data.Actors.BP_Hero",
                ClassRecord::new("Engine.Gameplay.Actors.Actor")
                    .attr("speed", 4)
                    .attr("name", "hero"),
            )
            .with(
                "Data.Actors.BP_FastHero",
                ClassRecord::new("Data.Actors.BP_Hero").attr("speed", 9),
            )
            .with("Data.Actors.BP_Orphan", ClassRecord::new("Data.Actors.Missing"));

        let mut registry = ClassRegistry::new(store);
        let actor = NativeClass::new("Engine.Gameplay.Actors.Actor")
            .attr("speed", 1)
            .attr("visible", true)
            .function_fn(
                FunctionMeta::new("GetSpeed").returns("speed", ParamType::Float),
                |_| Ok(Outputs::one(1.0)),
            )
            .unwrap();
        registry.register_native(actor);
        registry
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let registry = registry();
        let a = registry.resolve("Data.Actors.BP_Hero").unwrap();
        let b = registry.resolve("Data.Actors.BP_Hero").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.is_synthesized("Data.Actors.BP_Hero"));
        assert!(!registry.is_synthesized("Engine.Gameplay.Actors.Actor"));
    }

    #[test]
    fn test_overrides_walk_the_chain() {
        let registry = registry();
        let fast = registry.resolve("Data.Actors.BP_FastHero").unwrap();

        assert_eq!(fast.attr("speed"), Some(&Value::Int(9)));
        assert_eq!(fast.attr("name"), Some(&Value::from("hero")));
        assert_eq!(fast.attr("visible"), Some(&Value::Bool(true)));
        assert!(fast.function("GetSpeed").is_some());
        assert!(fast.is_a("Engine.Gameplay.Actors.Actor"));

        let paths: Vec<&str> = fast.ancestors().map(|c| c.path()).collect();
        assert_eq!(paths, vec!["Data.Actors.BP_Hero", "Engine.Gameplay.Actors.Actor"]);

        let attrs = fast.attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs["speed"], Value::Int(9));
    }

    #[test]
    fn test_reregistering_native_refreshes_descendants() {
        let mut registry = registry();
        let before = registry.resolve("Data.Actors.BP_FastHero").unwrap();
        assert_eq!(before.attr("visible"), Some(&Value::Bool(true)));

        registry.register_native(NativeClass::new("Engine.Gameplay.Actors.Actor").attr("visible", false));
        assert!(!registry.is_cached("Data.Actors.BP_Hero"));
        assert!(!registry.is_cached("Data.Actors.BP_FastHero"));

        let after = registry.resolve("Data.Actors.BP_FastHero").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.attr("visible"), Some(&Value::Bool(false)));
        assert!(after.function("GetSpeed").is_none());
    }

    #[test]
    fn test_missing_parent_is_an_error() {
        let registry = registry();
        let err = registry.resolve("Data.Actors.BP_Orphan").unwrap_err();
        assert!(matches!(err, RuntimeError::ClassNotFound(ref p) if p == "Data.Actors.Missing"));
        assert!(!registry.is_cached("Data.Actors.BP_Orphan"));
        assert!(registry.resolve("Data.Actors.Nothing").is_err());
    }

    #[test]
    fn test_parent_cycle_is_detected() {
        let store = MemoryClassStore::new()
            .with("A", ClassRecord::new("B"))
            .with("B", ClassRecord::new("A"));
        let registry = ClassRegistry::new(store);
        assert!(matches!(registry.resolve("A"), Err(RuntimeError::ClassCycle(_))));
    }

    #[test]
    fn test_directory_store() {
        let dir = tempfile::tempdir().unwrap();
        let actors = dir.path().join("Data").join("Actors");
        fs::create_dir_all(&actors).unwrap();
        fs::write(
            actors.join("BP_Slime.json"),
            r#"{"parent": "", "attrs": {"hp": 3, "tags": ["enemy"]}}"#,
        )
        .unwrap();
        fs::write(actors.join("BP_Broken.json"), "{ not json").unwrap();

        let store = DirectoryClassStore::new(dir.path());
        assert_eq!(
            store.record_path("Data.Actors.BP_Slime"),
            Some(actors.join("BP_Slime.json"))
        );
        assert!(store.record_path("Data..Slime").is_none());

        let registry = ClassRegistry::new(store);
        let slime = registry.resolve("Data.Actors.BP_Slime").unwrap();
        assert_eq!(slime.attr("hp"), Some(&Value::Int(3)));
        assert!(slime.parent().is_none());
        assert!(registry.contains("Data.Actors.BP_Slime"));
        assert!(!registry.contains("Data.Actors.BP_Ghost"));
        assert!(matches!(
            registry.resolve("Data.Actors.BP_Broken"),
            Err(RuntimeError::ClassStoreParse { .. })
        ));
    }
}
