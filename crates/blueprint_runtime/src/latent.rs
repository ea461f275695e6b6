// Latent Scheduler - Suspended graph continuations resumed across ticks
//
// A latent node registers a condition and a resume table; the host polls the
// scheduler once per tick and the scheduler re-enters the graph at the node
// wired to whichever latent label the condition's result matched.
//
// Graphs live in a GraphArena. Entries refer to them by generation-checked
// GraphId, so removing a graph makes its pending entries inert without the
// scheduler ever keeping a graph alive.

use std::fmt;

use blueprint_types::Value;

use crate::environment::Environment;
use crate::error::{Result, RuntimeError};
use crate::graph::Graph;

/// Condition evaluated on every poll against the suspended environment
pub type LatentCondition = Box<dyn FnMut(&Environment) -> Value + Send>;

// ─────────────────────────────────────────────────────────────────────────────
// Graph Arena
// ─────────────────────────────────────────────────────────────────────────────

/// Generation-checked reference to a graph in a GraphArena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId {
    index: u32,
    generation: u32,
}

impl GraphId {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    graph: Option<Graph>,
}

/// Owner of every live graph that can be suspended
#[derive(Default)]
pub struct GraphArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl GraphArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a graph; the graph learns its id
    pub fn insert(&mut self, mut graph: Graph) -> GraphId {
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                GraphId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    graph: None,
                });
                GraphId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };

        graph.set_id(Some(id));
        self.slots[id.index as usize].graph = Some(graph);
        self.len += 1;
        id
    }

    /// Remove a graph; every outstanding id for it becomes stale
    pub fn remove(&mut self, id: GraphId) -> Option<Graph> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let mut graph = slot.graph.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        graph.set_id(None);
        Some(graph)
    }

    pub fn get(&self, id: GraphId) -> Option<&Graph> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.graph.as_ref())
    }

    pub fn get_mut(&mut self, id: GraphId) -> Option<&mut Graph> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.graph.as_mut())
    }

    pub fn contains(&self, id: GraphId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.graph.as_ref().map(|_| GraphId {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Latent Entries
// ─────────────────────────────────────────────────────────────────────────────

/// A suspended continuation
pub struct LatentEntry {
    graph: GraphId,
    key: String,
    node: usize,
    condition: LatentCondition,
    environment: Environment,
    resume: Vec<(Value, usize)>,
}

impl LatentEntry {
    pub fn new(
        graph: GraphId,
        key: impl Into<String>,
        node: usize,
        condition: LatentCondition,
        environment: Environment,
        resume: Vec<(Value, usize)>,
    ) -> Self {
        Self {
            graph,
            key: key.into(),
            node,
            condition,
            environment,
            resume,
        }
    }

    pub fn graph(&self) -> GraphId {
        self.graph
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn node(&self) -> usize {
        self.node
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Node to resume at for a condition result
    pub fn resume_target(&self, result: &Value) -> Option<usize> {
        self.resume
            .iter()
            .find(|(value, _)| value == result)
            .map(|(_, node)| *node)
    }

    fn same_slot(&self, other: &LatentEntry) -> bool {
        self.graph == other.graph && self.node == other.node && self.key == other.key
    }
}

impl fmt::Debug for LatentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatentEntry")
            .field("graph", &self.graph)
            .field("key", &self.key)
            .field("node", &self.node)
            .field("resume", &self.resume)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// A resume that failed; the entry is consumed, the scheduler carries on
#[derive(Debug)]
pub struct ResumeFailure {
    pub graph: GraphId,
    pub key: String,
    pub node: usize,
    pub error: RuntimeError,
}

/// What one poll did
#[derive(Debug, Default)]
pub struct PollReport {
    pub resumed: usize,
    pub expired: usize,
    pub pending: usize,
    pub failures: Vec<ResumeFailure>,
}

/// Registry of suspended continuations, owned by the game loop
#[derive(Default)]
pub struct LatentScheduler {
    entries: Vec<LatentEntry>,
}

impl LatentScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; an entry for the same (graph, key, node) is replaced in place
    pub fn register(&mut self, entry: LatentEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.same_slot(&entry)) {
            tracing::debug!(
                graph = %entry.graph,
                key = %entry.key,
                node = entry.node,
                "Replacing pending latent entry"
            );
            *existing = entry;
            return;
        }

        tracing::debug!(
            graph = %entry.graph,
            key = %entry.key,
            node = entry.node,
            "Registered latent entry"
        );
        self.entries.push(entry);
    }

    /// Evaluate every pending entry once, in registration order
    pub fn poll(&mut self, arena: &mut GraphArena) -> PollReport {
        let mut report = PollReport::default();
        let mut kept = Vec::with_capacity(self.entries.len());

        for mut entry in std::mem::take(&mut self.entries) {
            let Some(graph) = arena.get_mut(entry.graph) else {
                tracing::trace!(graph = %entry.graph, key = %entry.key, "Dropping latent entry of removed graph");
                report.expired += 1;
                continue;
            };

            let result = (entry.condition)(&entry.environment);
            let Some(target) = entry.resume_target(&result) else {
                kept.push(entry);
                continue;
            };

            tracing::info!(
                graph = %entry.graph,
                key = %entry.key,
                node = entry.node,
                target,
                "Resuming latent continuation"
            );

            if let Err(error) = resume(graph, &entry, target, self) {
                tracing::error!(
                    graph = %entry.graph,
                    key = %entry.key,
                    node = entry.node,
                    error = %error,
                    "Latent resume failed"
                );
                report.failures.push(ResumeFailure {
                    graph: entry.graph,
                    key: entry.key,
                    node: entry.node,
                    error,
                });
                continue;
            }
            report.resumed += 1;
        }

        // Entries registered while resuming go behind the ones still waiting
        let registered = std::mem::replace(&mut self.entries, kept);
        for entry in registered {
            self.register(entry);
        }

        report.pending = self.entries.len();
        report
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LatentEntry> {
        self.entries.iter()
    }

    /// Number of entries waiting on a graph
    pub fn pending_for(&self, graph: GraphId) -> usize {
        self.entries.iter().filter(|e| e.graph == graph).count()
    }

    /// Drop every entry of a graph, returning how many were removed
    pub fn cancel_graph(&mut self, graph: GraphId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.graph != graph);
        before - self.entries.len()
    }
}

fn resume(
    graph: &mut Graph,
    entry: &LatentEntry,
    target: usize,
    scheduler: &mut LatentScheduler,
) -> Result<()> {
    let len = graph.node_count(&entry.key).unwrap_or(0);
    if target >= len {
        return Err(RuntimeError::InvalidResume {
            key: entry.key.clone(),
            node: target,
        });
    }

    graph.set_environment(entry.environment.clone());
    graph.execute_from(&entry.key, target, scheduler)?;
    Ok(())
}
