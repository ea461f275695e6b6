// Graph Engine - Builds and runs the sub-graphs of one blueprint instance
//
// Each key ("onCreate", "onTick", ...) is an independent sub-graph. Running a
// key walks control flow from its start node; every node on the way pulls its
// data inputs from upstream nodes, each evaluated at most once per run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use blueprint_types::{
    BranchConfig, GraphData, GraphSection, Handle, LinkKind, LinkRecord, Outputs, Value,
};

use crate::class_registry::ResolvedBehavior;
use crate::environment::{Environment, KEY_BINDING};
use crate::error::{Result, RuntimeError};
use crate::latent::{GraphId, LatentCondition, LatentEntry, LatentScheduler};
use crate::library::{FunctionEntry, FunctionLibrary};
use crate::node::NodeInstance;

/// Control-flow transitions allowed per run before it counts as runaway
pub const DEFAULT_STEP_LIMIT: usize = 10_000;

/// Prefix of function tokens that name an owner-class member
pub const SELF_PREFIX: &str = "self.";

/// pin -> (node, pin)
pub type PinMap = BTreeMap<usize, (usize, usize)>;

// ─────────────────────────────────────────────────────────────────────────────
// Sub-graph
// ─────────────────────────────────────────────────────────────────────────────

/// Built nodes and link tables of one key
#[derive(Debug, Clone)]
pub struct SubGraph {
    nodes: Vec<NodeInstance>,
    links: Vec<LinkRecord>,
    /// node -> input pin -> (source node, source output pin)
    dependencies: BTreeMap<usize, PinMap>,
    /// node -> exec output pin -> (target node, target input pin)
    successors: BTreeMap<usize, PinMap>,
    start: Option<usize>,
}

impl SubGraph {
    pub fn nodes(&self) -> &[NodeInstance] {
        &self.nodes
    }

    pub fn links(&self) -> &[LinkRecord] {
        &self.links
    }

    pub fn start(&self) -> Option<usize> {
        self.start
    }

    pub fn dependencies(&self, node: usize) -> Option<&PinMap> {
        self.dependencies.get(&node)
    }

    pub fn successors(&self, node: usize) -> Option<&PinMap> {
        self.successors.get(&node)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves node functions and splits links into the two tables
pub struct GraphBuilder<'a> {
    library: &'a FunctionLibrary,
    class: Option<Arc<ResolvedBehavior>>,
    owner: Option<Handle>,
    step_limit: usize,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(library: &'a FunctionLibrary) -> Self {
        Self {
            library,
            class: None,
            owner: None,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Class searched for `self.` members and before the library
    pub fn class(mut self, class: Arc<ResolvedBehavior>) -> Self {
        self.class = Some(class);
        self
    }

    /// Object bound to `self` parameter tokens
    pub fn owner(mut self, owner: Handle) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn build(self, data: &GraphData) -> Result<Graph> {
        let mut sections = BTreeMap::new();
        for (key, section) in &data.node_graph {
            let start = data.start_nodes.get(key).copied();
            sections.insert(key.clone(), self.build_section(key, section, start)?);
        }

        tracing::info!(
            class = self.class.as_ref().map(|c| c.path()).unwrap_or("-"),
            keys = sections.len(),
            "Built graph"
        );

        Ok(Graph {
            id: None,
            parent: data.parent.clone(),
            owner: self.owner,
            sections,
            env: Environment::new(),
            step_limit: self.step_limit,
        })
    }

    fn build_section(&self, key: &str, section: &GraphSection, start: Option<usize>) -> Result<SubGraph> {
        let nodes = section
            .nodes
            .iter()
            .map(|descriptor| {
                let entry = self.resolve_function(&descriptor.node_function)?;
                Ok(NodeInstance::new(descriptor, entry, self.owner.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut dependencies: BTreeMap<usize, PinMap> = BTreeMap::new();
        let mut successors: BTreeMap<usize, PinMap> = BTreeMap::new();
        for link in &section.links {
            for node in [link.left, link.right] {
                if node >= nodes.len() {
                    return Err(RuntimeError::LinkOutOfRange {
                        key: key.to_string(),
                        node,
                        len: nodes.len(),
                    });
                }
            }
            match link.link_type {
                LinkKind::Data => {
                    dependencies
                        .entry(link.right)
                        .or_default()
                        .insert(link.right_in_pin, (link.left, link.left_out_pin));
                }
                LinkKind::Control => {
                    successors
                        .entry(link.left)
                        .or_default()
                        .insert(link.left_out_pin, (link.right, link.right_in_pin));
                }
            }
        }

        Ok(SubGraph {
            nodes,
            links: section.links.clone(),
            dependencies,
            successors,
            start,
        })
    }

    /// `self.<member>` names one member function of the owner class. Nested
    /// paths such as `self.a.b` are not walked and fail to resolve.
    fn resolve_function(&self, token: &str) -> Result<FunctionEntry> {
        let token = token.trim();
        let found = match token.strip_prefix(SELF_PREFIX) {
            Some(member) if member.contains('.') => None,
            Some(member) => self.class.as_ref().and_then(|c| c.function(member.trim())),
            None => self
                .class
                .as_ref()
                .and_then(|c| c.function(token))
                .or_else(|| self.library.get(token)),
        };

        found.cloned().ok_or_else(|| RuntimeError::FunctionNotFound {
            function: token.to_string(),
            owner: self
                .class
                .as_ref()
                .map(|c| c.path().to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graph
// ─────────────────────────────────────────────────────────────────────────────

/// All sub-graphs of one blueprint instance plus their shared environment
#[derive(Debug)]
pub struct Graph {
    id: Option<GraphId>,
    parent: Option<String>,
    owner: Option<Handle>,
    sections: BTreeMap<String, SubGraph>,
    env: Environment,
    step_limit: usize,
}

/// A clone is detached: it gets its own arena id only once inserted.
impl Clone for Graph {
    fn clone(&self) -> Self {
        Self {
            id: None,
            parent: self.parent.clone(),
            owner: self.owner.clone(),
            sections: self.sections.clone(),
            env: self.env.clone(),
            step_limit: self.step_limit,
        }
    }
}

impl Graph {
    /// Arena id, once the graph is held by a GraphArena
    pub fn id(&self) -> Option<GraphId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: Option<GraphId>) {
        self.id = id;
    }

    pub fn owner(&self) -> Option<&Handle> {
        self.owner.as_ref()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.sections.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn section(&self, key: &str) -> Option<&SubGraph> {
        self.sections.get(key)
    }

    pub fn nodes(&self, key: &str) -> Option<&[NodeInstance]> {
        self.sections.get(key).map(|s| s.nodes.as_slice())
    }

    pub fn node_count(&self, key: &str) -> Option<usize> {
        self.sections.get(key).map(|s| s.nodes.len())
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn set_environment(&mut self, env: Environment) {
        self.env = env;
    }

    pub fn step_limit(&self) -> usize {
        self.step_limit
    }

    /// Serialize back to the persisted format
    pub fn to_data(&self) -> GraphData {
        let mut data = GraphData {
            parent: self.parent.clone(),
            ..GraphData::default()
        };
        for (key, section) in &self.sections {
            let nodes = section.nodes.iter().map(NodeInstance::to_descriptor).collect();
            data.node_graph.insert(
                key.clone(),
                GraphSection {
                    nodes,
                    links: section.links.clone(),
                },
            );
            if let Some(start) = section.start {
                data.start_nodes.insert(key.clone(), start);
            }
        }
        data
    }

    /// Every node `node` transitively depends on, dependencies first
    pub fn dependency_order(&self, key: &str, node: usize) -> Result<Vec<usize>> {
        let section = self
            .sections
            .get(key)
            .ok_or_else(|| RuntimeError::UnknownKey(key.to_string()))?;

        fn visit(section: &SubGraph, node: usize, seen: &mut HashSet<usize>, order: &mut Vec<usize>) {
            if !seen.insert(node) {
                return;
            }
            if let Some(deps) = section.dependencies.get(&node) {
                for &(source, _) in deps.values() {
                    visit(section, source, seen, order);
                    if !order.contains(&source) {
                        order.push(source);
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        let mut order = Vec::new();
        visit(section, node, &mut seen, &mut order);
        order.retain(|&n| n != node);
        Ok(order)
    }

    /// Run `key` from its start node
    pub fn execute(&mut self, key: &str, scheduler: &mut LatentScheduler) -> Result<Outputs> {
        self.run(key, None, self.step_limit, scheduler)
    }

    /// Run `key` from an explicit node (used when resuming)
    pub fn execute_from(
        &mut self,
        key: &str,
        start: usize,
        scheduler: &mut LatentScheduler,
    ) -> Result<Outputs> {
        self.run(key, Some(start), self.step_limit, scheduler)
    }

    /// Run `key` from its start node with a one-off step limit
    pub fn execute_with_limit(
        &mut self,
        key: &str,
        limit: usize,
        scheduler: &mut LatentScheduler,
    ) -> Result<Outputs> {
        self.run(key, None, limit, scheduler)
    }

    fn run(
        &mut self,
        key: &str,
        start: Option<usize>,
        limit: usize,
        scheduler: &mut LatentScheduler,
    ) -> Result<Outputs> {
        let section = self
            .sections
            .get(key)
            .filter(|s| !s.nodes.is_empty())
            .ok_or_else(|| RuntimeError::UnknownKey(key.to_string()))?;
        let start = match start.or(section.start) {
            Some(start) => start,
            None => return Err(RuntimeError::MissingStartNode(key.to_string())),
        };
        if start >= section.nodes.len() {
            return Err(RuntimeError::StartOutOfRange {
                key: key.to_string(),
                index: start,
                len: section.nodes.len(),
            });
        }

        self.env.set(KEY_BINDING, key);
        let mut eval = Evaluator {
            key,
            section,
            env: &mut self.env,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
        };

        let mut current = start;
        let mut steps = 0usize;
        loop {
            let (outputs, wait) = eval.step(current)?;
            let successors = section.successors.get(&current);

            if let Some(condition) = wait {
                let node = &section.nodes[current];
                let resume = resume_table(&node.meta().latents, successors);
                if resume.is_empty() {
                    tracing::debug!(key, node = current, "Latent node has no wired outputs");
                    return Ok(outputs);
                }
                let graph = self.id.ok_or_else(|| RuntimeError::DetachedGraph {
                    key: key.to_string(),
                    node: current,
                })?;
                scheduler.register(LatentEntry::new(
                    graph,
                    key,
                    current,
                    condition,
                    eval.env.clone(),
                    resume,
                ));
                return Ok(outputs);
            }

            let Some(successors) = successors.filter(|s| !s.is_empty()) else {
                return Ok(outputs);
            };
            let branches = &section.nodes[current].meta().branches;
            let Some(next) = select_next(branches, &outputs, successors) else {
                tracing::debug!(key, node = current, "No branch matched");
                return Ok(outputs);
            };

            tracing::debug!(key, from = current, to = next, "Control flow");
            current = next;
            steps += 1;
            if steps >= limit {
                tracing::warn!(key, limit, "Graph exceeded its step limit");
                return Err(RuntimeError::StepLimitExceeded {
                    key: key.to_string(),
                    limit,
                });
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

/// State of one run: the execution cache and the cycle guard
struct Evaluator<'a> {
    key: &'a str,
    section: &'a SubGraph,
    env: &'a mut Environment,
    cache: HashMap<usize, Outputs>,
    in_progress: HashSet<usize>,
}

impl Evaluator<'_> {
    /// Evaluate a node on the control path, keeping any wait it requested
    fn step(&mut self, node: usize) -> Result<(Outputs, Option<LatentCondition>)> {
        if let Some(outputs) = self.cache.get(&node) {
            tracing::trace!(key = self.key, node, "Execution cache hit");
            return Ok((outputs.clone(), None));
        }
        self.call(node)
    }

    /// Evaluate a node as a data dependency
    fn evaluate(&mut self, node: usize) -> Result<Outputs> {
        let (outputs, wait) = self.step(node)?;
        if wait.is_some() {
            return Err(RuntimeError::LatentInDataPath {
                key: self.key.to_string(),
                node,
            });
        }
        Ok(outputs)
    }

    fn call(&mut self, node: usize) -> Result<(Outputs, Option<LatentCondition>)> {
        if !self.in_progress.insert(node) {
            return Err(RuntimeError::DependencyCycle {
                key: self.key.to_string(),
                node,
            });
        }

        let section = self.section;
        let mut overrides = BTreeMap::new();
        if let Some(deps) = section.dependencies.get(&node) {
            for (&in_pin, &(source, out_pin)) in deps {
                let outputs = self.evaluate(source)?;
                let value = outputs.get(out_pin).cloned().ok_or_else(|| {
                    RuntimeError::OutputPinOutOfRange {
                        key: self.key.to_string(),
                        node: source,
                        pin: out_pin,
                        len: outputs.len(),
                    }
                })?;
                overrides.insert(in_pin, value);
            }
        }

        let instance = &section.nodes[node];
        tracing::debug!(key = self.key, node, function = instance.function_ref(), "Evaluating node");
        let call = instance.execute(&overrides, self.env)?;

        self.in_progress.remove(&node);
        self.cache.insert(node, call.outputs.clone());
        Ok((call.outputs, call.wait))
    }
}

/// Successor chosen by the result tuple and branch configuration
fn select_next(branches: &BranchConfig, outputs: &Outputs, successors: &PinMap) -> Option<usize> {
    if branches.is_empty() {
        return successors.values().next().map(|&(target, _)| target);
    }

    outputs.iter().find_map(|value| {
        branches
            .pins()
            .filter(|(_, set)| set.values.contains(value))
            .find_map(|(pin, _)| successors.get(&pin).map(|&(target, _)| target))
    })
}

/// Latent literal -> successor wired to that label's pin
fn resume_table(latents: &BranchConfig, successors: Option<&PinMap>) -> Vec<(Value, usize)> {
    let Some(successors) = successors else {
        return Vec::new();
    };
    latents
        .pins()
        .filter_map(|(pin, set)| successors.get(&pin).map(|&(target, _)| (set, target)))
        .flat_map(|(set, target)| set.values.iter().map(move |v| (v.clone(), target)))
        .collect()
}
